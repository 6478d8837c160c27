// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Kernel handles backed by a Jupyter server.
//!
//! Lifecycle goes through the kernels REST API; execution goes through the
//! kernel's channels WebSocket: one `execute_request` on the shell channel,
//! then iopub messages for the matching parent are collected as nbformat
//! output records until the kernel reports `status: idle`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, info};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::config::RoomRuntime;

use super::{RuntimeClient, RuntimeConnector, RuntimeError};

const PROTOCOL_VERSION: &str = "5.3";
const DEFAULT_KERNEL_NAME: &str = "python3";

/// Connector building [`KernelHandle`]s from the active configuration.
#[derive(Debug, Clone, Default)]
pub struct JupyterRuntimes {
    http: reqwest::Client,
}

impl JupyterRuntimes {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuntimeConnector for JupyterRuntimes {
    async fn connect(&self, config: &RoomRuntime) -> Result<Arc<dyn RuntimeClient>, RuntimeError> {
        Ok(Arc::new(KernelHandle::connect(self.http.clone(), config).await?))
    }
}

/// One attached (or freshly started) kernel.
pub struct KernelHandle {
    http: reqwest::Client,
    base_url: String,
    auth: Option<String>,
    kernel_id: String,
    /// Kernel-session id shared by all messages from this handle.
    session_id: String,
    /// Whether this handle started the kernel and therefore owns shutdown.
    owned: bool,
}

impl KernelHandle {
    pub async fn connect(
        http: reqwest::Client,
        config: &RoomRuntime,
    ) -> Result<Self, RuntimeError> {
        let base_url = config.runtime_url.trim_end_matches('/').to_owned();
        let auth = config
            .runtime_token
            .as_deref()
            .map(|token| config.provider.authorization(token));

        let (kernel_id, owned) = match &config.runtime_id {
            Some(kernel_id) => {
                let url = format!("{base_url}/api/kernels/{kernel_id}");
                let response = authorized(http.get(&url), &auth)
                    .send()
                    .await
                    .map_err(|err| RuntimeError::Start(err.to_string()))?;
                if !response.status().is_success() {
                    return Err(RuntimeError::Start(format!(
                        "kernel {kernel_id} not available: HTTP {}",
                        response.status()
                    )));
                }
                (kernel_id.clone(), false)
            }
            None => {
                let url = format!("{base_url}/api/kernels");
                let response = authorized(http.post(&url), &auth)
                    .json(&json!({ "name": DEFAULT_KERNEL_NAME }))
                    .send()
                    .await
                    .map_err(|err| RuntimeError::Start(err.to_string()))?;
                if !response.status().is_success() {
                    return Err(RuntimeError::Start(format!(
                        "cannot start kernel: HTTP {}",
                        response.status()
                    )));
                }
                let body: Value = response
                    .json()
                    .await
                    .map_err(|err| RuntimeError::Start(err.to_string()))?;
                let kernel_id = body
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        RuntimeError::Start("kernel start response carries no id".to_owned())
                    })?
                    .to_owned();
                info!("started kernel {kernel_id}");
                (kernel_id, true)
            }
        };

        Ok(Self {
            http,
            base_url,
            auth,
            kernel_id,
            session_id: Uuid::new_v4().to_string(),
            owned,
        })
    }
}

#[async_trait]
impl RuntimeClient for KernelHandle {
    async fn execute(&self, code: &str) -> Result<Vec<Value>, RuntimeError> {
        let url = channels_url(&self.base_url, &self.kernel_id, &self.session_id)?;
        let mut request = url
            .into_client_request()
            .map_err(|err| RuntimeError::Unreachable(err.to_string()))?;
        if let Some(auth) = &self.auth {
            let value = auth
                .parse()
                .map_err(|_| RuntimeError::Unreachable("invalid auth header".to_owned()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, _) = connect_async(request)
            .await
            .map_err(|err| RuntimeError::Unreachable(err.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let msg_id = Uuid::new_v4().to_string();
        let request = execute_request(&self.session_id, &msg_id, code);
        let frame = serde_json::to_string(&request)
            .map_err(|err| RuntimeError::Unreachable(err.to_string()))?;
        sink.send(Message::Text(frame.into()))
            .await
            .map_err(|err| RuntimeError::Unreachable(err.to_string()))?;
        debug!("submitted execute_request {msg_id} to kernel {}", self.kernel_id);

        let mut outputs = Vec::new();
        while let Some(frame) = stream.next().await {
            let frame = frame.map_err(|err| RuntimeError::Unreachable(err.to_string()))?;
            let message: Value = match frame {
                Message::Text(text) => match serde_json::from_str(text.as_str()) {
                    Ok(message) => message,
                    Err(_) => continue,
                },
                Message::Close(_) => {
                    return Err(RuntimeError::Unreachable(
                        "kernel closed the channel mid-execution".to_owned(),
                    ));
                }
                _ => continue,
            };

            if parent_msg_id(&message) != Some(msg_id.as_str()) {
                continue;
            }
            if is_idle(&message) {
                break;
            }
            if let Some(record) = output_record(&message) {
                outputs.push(record);
            }
        }

        Ok(outputs)
    }

    async fn stop(&self) -> Result<(), RuntimeError> {
        if !self.owned {
            return Ok(());
        }
        let url = format!("{}/api/kernels/{}", self.base_url, self.kernel_id);
        let response = authorized(self.http.delete(&url), &self.auth)
            .send()
            .await
            .map_err(|err| RuntimeError::Stop(err.to_string()))?;
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(RuntimeError::Stop(format!(
                "cannot shut down kernel {}: HTTP {status}",
                self.kernel_id
            )));
        }
        info!("stopped kernel {}", self.kernel_id);
        Ok(())
    }
}

fn authorized(request: reqwest::RequestBuilder, auth: &Option<String>) -> reqwest::RequestBuilder {
    match auth {
        Some(auth) => request.header(reqwest::header::AUTHORIZATION, auth),
        None => request,
    }
}

/// Kernel channels endpoint, with the HTTP scheme rewritten to WebSocket.
fn channels_url(base_url: &str, kernel_id: &str, session_id: &str) -> Result<String, RuntimeError> {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(RuntimeError::Unreachable(format!(
            "runtime url {base_url} is not http(s)"
        )));
    };
    Ok(format!("{ws_base}/api/kernels/{kernel_id}/channels?session_id={session_id}"))
}

/// Shell-channel `execute_request` in the Jupyter server WebSocket framing.
fn execute_request(session_id: &str, msg_id: &str, code: &str) -> Value {
    json!({
        "header": {
            "msg_id": msg_id,
            "msg_type": "execute_request",
            "session": session_id,
            "username": "jupyter-mcp",
            "version": PROTOCOL_VERSION,
            "date": "",
        },
        "parent_header": {},
        "metadata": {},
        "content": {
            "code": code,
            "silent": false,
            "store_history": true,
            "user_expressions": {},
            "allow_stdin": false,
            "stop_on_error": true,
        },
        "channel": "shell",
        "buffers": [],
    })
}

fn parent_msg_id(message: &Value) -> Option<&str> {
    message.get("parent_header")?.get("msg_id")?.as_str()
}

fn is_idle(message: &Value) -> bool {
    message.get("channel").and_then(Value::as_str) == Some("iopub")
        && message.get("header").and_then(|header| header.get("msg_type")).and_then(Value::as_str)
            == Some("status")
        && message
            .get("content")
            .and_then(|content| content.get("execution_state"))
            .and_then(Value::as_str)
            == Some("idle")
}

/// Maps one iopub message to its nbformat output record, if it carries one.
fn output_record(message: &Value) -> Option<Value> {
    if message.get("channel").and_then(Value::as_str) != Some("iopub") {
        return None;
    }
    let msg_type = message.get("header")?.get("msg_type")?.as_str()?;
    let content = message.get("content")?;
    let field = |name: &str| content.get(name).cloned().unwrap_or(Value::Null);
    let data_field = |name: &str| {
        content.get(name).cloned().unwrap_or_else(|| json!({}))
    };

    match msg_type {
        "stream" => Some(json!({
            "output_type": "stream",
            "name": field("name"),
            "text": field("text"),
        })),
        "display_data" => Some(json!({
            "output_type": "display_data",
            "data": data_field("data"),
            "metadata": data_field("metadata"),
        })),
        "execute_result" => Some(json!({
            "output_type": "execute_result",
            "execution_count": field("execution_count"),
            "data": data_field("data"),
            "metadata": data_field("metadata"),
        })),
        "error" => Some(json!({
            "output_type": "error",
            "ename": field("ename"),
            "evalue": field("evalue"),
            "traceback": content.get("traceback").cloned().unwrap_or_else(|| json!([])),
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iopub(msg_type: &str, parent: &str, content: Value) -> Value {
        json!({
            "header": {"msg_id": Uuid::new_v4().to_string(), "msg_type": msg_type},
            "parent_header": {"msg_id": parent},
            "channel": "iopub",
            "content": content,
        })
    }

    #[test]
    fn rewrites_http_schemes_to_websocket() {
        assert_eq!(
            channels_url("http://localhost:8888", "k1", "s1").expect("url"),
            "ws://localhost:8888/api/kernels/k1/channels?session_id=s1"
        );
        assert_eq!(
            channels_url("https://hub.example.org", "k1", "s1").expect("url"),
            "wss://hub.example.org/api/kernels/k1/channels?session_id=s1"
        );
        channels_url("ftp://x", "k1", "s1").expect_err("non-http scheme");
    }

    #[test]
    fn execute_request_is_shell_framed() {
        let request = execute_request("sess", "msg-1", "1+1");
        assert_eq!(request["channel"], "shell");
        assert_eq!(request["header"]["msg_type"], "execute_request");
        assert_eq!(request["header"]["msg_id"], "msg-1");
        assert_eq!(request["header"]["session"], "sess");
        assert_eq!(request["content"]["code"], "1+1");
        assert_eq!(request["content"]["allow_stdin"], false);
    }

    #[test]
    fn collects_output_records_from_iopub_messages() {
        let stream = iopub("stream", "m", json!({"name": "stdout", "text": "hi\n"}));
        let record = output_record(&stream).expect("stream record");
        assert_eq!(record["output_type"], "stream");
        assert_eq!(record["text"], "hi\n");

        let result = iopub(
            "execute_result",
            "m",
            json!({"execution_count": 1, "data": {"text/plain": "2"}, "metadata": {}}),
        );
        let record = output_record(&result).expect("execute_result record");
        assert_eq!(record["output_type"], "execute_result");
        assert_eq!(record["data"]["text/plain"], "2");

        let error = iopub(
            "error",
            "m",
            json!({"ename": "E", "evalue": "boom", "traceback": ["line"]}),
        );
        let record = output_record(&error).expect("error record");
        assert_eq!(record["output_type"], "error");
        assert_eq!(record["traceback"], json!(["line"]));
    }

    #[test]
    fn ignores_non_output_messages() {
        assert!(output_record(&iopub("execute_input", "m", json!({"code": "1+1"}))).is_none());
        let shell_reply = json!({
            "header": {"msg_type": "execute_reply"},
            "parent_header": {"msg_id": "m"},
            "channel": "shell",
            "content": {"status": "ok"},
        });
        assert!(output_record(&shell_reply).is_none());
    }

    #[test]
    fn detects_idle_status_for_the_parent_request() {
        let idle = iopub("status", "m", json!({"execution_state": "idle"}));
        assert!(is_idle(&idle));
        assert_eq!(parent_msg_id(&idle), Some("m"));

        let busy = iopub("status", "m", json!({"execution_state": "busy"}));
        assert!(!is_idle(&busy));
    }
}
