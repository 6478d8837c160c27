// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Room sessions backed by the Jupyter contents REST API.
//!
//! `open` fetches the notebook document, edits are applied to the in-memory
//! model, and `close` writes the document back when anything changed. The
//! `jupyter` and `datalayer` providers share this client and differ only in
//! their authorization scheme.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::config::{Provider, RoomRuntime};
use crate::model::{Cell, Notebook};

use super::{RoomClient, RoomError, RoomSession};

/// Connector opening contents-API sessions.
#[derive(Debug, Clone, Default)]
pub struct JupyterRooms {
    http: reqwest::Client,
}

impl JupyterRooms {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomClient for JupyterRooms {
    async fn open(&self, config: &RoomRuntime) -> Result<Box<dyn RoomSession>, RoomError> {
        let url = contents_url(&config.room_url, &config.room_id);
        let auth = auth_header(config.provider, config.room_token.as_deref());

        let mut request = self.http.get(&url).query(&[("type", "notebook"), ("content", "1")]);
        if let Some(auth) = &auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let connect_err = |reason: String| RoomError::Connect {
            room_id: config.room_id.clone(),
            reason,
        };

        let response = request.send().await.map_err(|err| connect_err(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(connect_err(format!("{url} answered HTTP {status}")));
        }

        let body: Value =
            response.json().await.map_err(|err| connect_err(err.to_string()))?;
        let notebook = parse_contents_response(&body).map_err(connect_err)?;
        debug!("opened room {} with {} cells", config.room_id, notebook.cells.len());

        Ok(Box::new(JupyterRoomSession {
            http: self.http.clone(),
            url,
            auth,
            room_id: config.room_id.clone(),
            notebook,
            dirty: false,
        }))
    }
}

struct JupyterRoomSession {
    http: reqwest::Client,
    url: String,
    auth: Option<String>,
    room_id: String,
    notebook: Notebook,
    dirty: bool,
}

#[async_trait]
impl RoomSession for JupyterRoomSession {
    fn cell_count(&self) -> usize {
        self.notebook.cells.len()
    }

    fn cell(&self, index: usize) -> &Cell {
        &self.notebook.cells[index]
    }

    fn insert_markdown(&mut self, index: usize, source: &str) {
        self.notebook.insert_markdown(index, source);
        self.dirty = true;
    }

    fn append_markdown(&mut self, source: &str) {
        self.notebook.append_markdown(source);
        self.dirty = true;
    }

    fn insert_code(&mut self, index: usize, source: &str) -> usize {
        self.dirty = true;
        self.notebook.insert_code(index, source)
    }

    fn append_code(&mut self, source: &str) -> usize {
        self.dirty = true;
        self.notebook.append_code(source)
    }

    fn set_source(&mut self, index: usize, source: &str) {
        self.notebook.set_source(index, source);
        self.dirty = true;
    }

    fn set_outputs(&mut self, index: usize, outputs: Vec<Value>) {
        self.notebook.set_outputs(index, outputs);
        self.dirty = true;
    }

    fn delete(&mut self, index: usize) -> Cell {
        self.dirty = true;
        self.notebook.delete(index)
    }

    async fn close(self: Box<Self>) -> Result<(), RoomError> {
        if !self.dirty {
            return Ok(());
        }

        let body = serde_json::json!({
            "type": "notebook",
            "format": "json",
            "content": self.notebook,
        });

        let mut request = self.http.put(&self.url).json(&body);
        if let Some(auth) = &self.auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let close_err = |reason: String| RoomError::Close {
            room_id: self.room_id.clone(),
            reason,
        };

        let response = request.send().await.map_err(|err| close_err(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(close_err(format!("{} answered HTTP {status}", self.url)));
        }
        debug!("saved room {}", self.room_id);
        Ok(())
    }
}

fn contents_url(room_url: &str, room_id: &str) -> String {
    format!("{}/api/contents/{}", room_url.trim_end_matches('/'), room_id.trim_start_matches('/'))
}

fn auth_header(provider: Provider, token: Option<&str>) -> Option<String> {
    token.map(|token| provider.authorization(token))
}

fn parse_contents_response(body: &Value) -> Result<Notebook, String> {
    let content = body
        .get("content")
        .filter(|content| !content.is_null())
        .ok_or_else(|| "contents response has no notebook content".to_owned())?;
    serde_json::from_value(content.clone())
        .map_err(|err| format!("malformed notebook document: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_contents_url_without_doubled_slashes() {
        assert_eq!(
            contents_url("http://localhost:8888/", "/work/analysis.ipynb"),
            "http://localhost:8888/api/contents/work/analysis.ipynb"
        );
        assert_eq!(
            contents_url("http://localhost:8888", "notebook.ipynb"),
            "http://localhost:8888/api/contents/notebook.ipynb"
        );
    }

    #[test]
    fn auth_header_scheme_follows_provider() {
        assert_eq!(auth_header(Provider::Jupyter, Some("t")), Some("token t".to_owned()));
        assert_eq!(auth_header(Provider::Datalayer, Some("t")), Some("Bearer t".to_owned()));
        assert_eq!(auth_header(Provider::Jupyter, None), None);
    }

    #[test]
    fn parses_notebook_out_of_contents_envelope() {
        let body = json!({
            "name": "notebook.ipynb",
            "path": "notebook.ipynb",
            "type": "notebook",
            "content": {
                "cells": [
                    {"cell_type": "markdown", "source": ["# Title"], "metadata": {}},
                ],
                "metadata": {},
                "nbformat": 4,
                "nbformat_minor": 5,
            },
        });
        let notebook = parse_contents_response(&body).expect("notebook");
        assert_eq!(notebook.cells.len(), 1);
        assert_eq!(notebook.cells[0].source, "# Title");
    }

    #[test]
    fn rejects_envelope_without_content() {
        parse_contents_response(&json!({"name": "x"})).expect_err("no content");
        parse_contents_response(&json!({"content": null})).expect_err("null content");
    }

    #[test]
    fn session_edits_mark_the_document_dirty() {
        let mut session = JupyterRoomSession {
            http: reqwest::Client::new(),
            url: "http://localhost:8888/api/contents/notebook.ipynb".to_owned(),
            auth: None,
            room_id: "notebook.ipynb".to_owned(),
            notebook: Notebook::default(),
            dirty: false,
        };

        assert_eq!(session.cell_count(), 0);
        session.append_markdown("# Title");
        let index = session.append_code("1+1");
        assert_eq!(index, 1);
        assert_eq!(session.cell_count(), 2);
        assert!(session.dirty);

        session.set_outputs(index, vec![json!({"output_type": "stream", "text": "x"})]);
        assert_eq!(session.cell(index).outputs().len(), 1);
    }
}
