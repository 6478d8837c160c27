// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Process-wide coordination state, bundled for injection.
//!
//! The context owns the only two pieces of mutable process state: the active
//! room/runtime configuration and the runtime registry. The MCP tool surface
//! and the HTTP routes share one context; tests inject in-memory room and
//! runtime implementations through the same constructor.

use std::sync::Arc;

use log::info;
use tokio::sync::RwLock;

use crate::config::RoomRuntime;
use crate::room::{JupyterRooms, RoomClient, RoomError, RoomSession};
use crate::runtime::{JupyterRuntimes, RuntimeConnector, RuntimeError, RuntimeRegistry};

#[derive(Clone)]
pub struct ServerContext {
    config: Arc<RwLock<RoomRuntime>>,
    rooms: Arc<dyn RoomClient>,
    registry: RuntimeRegistry,
}

impl ServerContext {
    pub fn new(
        config: RoomRuntime,
        rooms: Arc<dyn RoomClient>,
        connector: Arc<dyn RuntimeConnector>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            rooms,
            registry: RuntimeRegistry::new(connector),
        }
    }

    /// Context wired to a real Jupyter room and runtime.
    pub fn jupyter(config: RoomRuntime) -> Self {
        Self::new(config, Arc::new(JupyterRooms::new()), Arc::new(JupyterRuntimes::new()))
    }

    /// Snapshot of the most recent configuration.
    pub async fn config(&self) -> RoomRuntime {
        self.config.read().await.clone()
    }

    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    /// Opens a room session against the current configuration.
    pub async fn open_session(&self) -> Result<Box<dyn RoomSession>, RoomError> {
        let config = self.config().await;
        self.rooms.open(&config).await
    }

    /// Replaces the configuration wholesale and restarts the runtime from
    /// it. This is the only way process state changes after startup.
    pub async fn reconnect(&self, config: RoomRuntime) -> Result<(), RuntimeError> {
        info!(
            "connecting to room {} ({} provider)",
            config.room_id,
            config.provider.as_str()
        );
        *self.config.write().await = config.clone();
        self.registry.reconfigure(&config).await
    }
}
