// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Plain HTTP endpoints served next to the `/mcp` service.
//!
//! `PUT /api/connect` replaces the room/runtime configuration at runtime;
//! `GET /api/healthz` is a static liveness probe. Malformed connect payloads
//! are rejected by the `Json` extractor before any state changes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::RoomRuntime;
use crate::context::ServerContext;

pub fn routes(ctx: ServerContext) -> Router {
    Router::new()
        .route("/api/connect", put(connect))
        .route("/api/healthz", get(healthz))
        .with_state(ctx)
}

async fn connect(
    State(ctx): State<ServerContext>,
    Json(config): Json<RoomRuntime>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    ctx.reconnect(config).await.map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "message": err.to_string()})),
        )
    })?;
    Ok(Json(json!({"success": true})))
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "success": true,
        "service": "jupyter-mcp-server",
        "message": "Jupyter MCP Server is running.",
        "status": "healthy",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::config::Provider;
    use crate::room::MemoryRooms;
    use crate::runtime::{RuntimeClient, RuntimeConnector, RuntimeError};

    struct IdleRuntime;

    #[async_trait]
    impl RuntimeClient for IdleRuntime {
        async fn execute(&self, _code: &str) -> Result<Vec<Value>, RuntimeError> {
            Ok(Vec::new())
        }

        async fn stop(&self) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    struct IdleConnector;

    #[async_trait]
    impl RuntimeConnector for IdleConnector {
        async fn connect(
            &self,
            _config: &RoomRuntime,
        ) -> Result<Arc<dyn RuntimeClient>, RuntimeError> {
            Ok(Arc::new(IdleRuntime))
        }
    }

    struct BrokenConnector;

    #[async_trait]
    impl RuntimeConnector for BrokenConnector {
        async fn connect(
            &self,
            _config: &RoomRuntime,
        ) -> Result<Arc<dyn RuntimeClient>, RuntimeError> {
            Err(RuntimeError::Start("kernel service refused".to_owned()))
        }
    }

    fn context(connector: Arc<dyn RuntimeConnector>) -> ServerContext {
        ServerContext::new(RoomRuntime::default(), Arc::new(MemoryRooms::new()), connector)
    }

    #[tokio::test]
    async fn healthz_reports_the_service_healthy() {
        let Json(body) = healthz().await;
        assert_eq!(body["success"], true);
        assert_eq!(body["service"], "jupyter-mcp-server");
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn connect_replaces_the_configuration_and_starts_a_runtime() {
        let ctx = context(Arc::new(IdleConnector));
        let payload = RoomRuntime {
            provider: Provider::Datalayer,
            room_id: "work/analysis.ipynb".to_owned(),
            ..RoomRuntime::default()
        };

        let Json(body) =
            connect(State(ctx.clone()), Json(payload.clone())).await.expect("connect");
        assert_eq!(body, json!({"success": true}));
        assert_eq!(ctx.config().await, payload);
        assert!(ctx.registry().current().await.is_some());
    }

    #[tokio::test]
    async fn connect_surfaces_runtime_start_failures() {
        let ctx = context(Arc::new(BrokenConnector));

        let (status, Json(body)) = connect(State(ctx.clone()), Json(RoomRuntime::default()))
            .await
            .err()
            .expect("start failure");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(ctx.registry().current().await.is_none());
    }
}
