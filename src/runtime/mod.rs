// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! The code-execution runtime (kernel) and its process-wide registry.
//!
//! At most one runtime handle exists at a time. Reconfiguring stops the old
//! handle to completion before a new one is started; operations read the
//! current handle but never mutate it.

pub mod jupyter;

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::RoomRuntime;

pub use jupyter::JupyterRuntimes;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime could not be started or attached to.
    #[error("cannot start runtime: {0}")]
    Start(String),

    /// The runtime connection failed mid-execution.
    #[error("runtime unreachable: {0}")]
    Unreachable(String),

    /// The runtime could not be stopped cleanly.
    #[error("cannot stop runtime: {0}")]
    Stop(String),
}

/// A live handle to one kernel.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Runs `code` to completion and returns the raw output records the run
    /// produced, in order.
    async fn execute(&self, code: &str) -> Result<Vec<Value>, RuntimeError>;

    async fn stop(&self) -> Result<(), RuntimeError>;
}

/// Builds runtime handles from the active configuration.
#[async_trait]
pub trait RuntimeConnector: Send + Sync {
    async fn connect(&self, config: &RoomRuntime) -> Result<Arc<dyn RuntimeClient>, RuntimeError>;
}

/// Process-wide owner of the single runtime handle.
#[derive(Clone)]
pub struct RuntimeRegistry {
    connector: Arc<dyn RuntimeConnector>,
    handle: Arc<Mutex<Option<Arc<dyn RuntimeClient>>>>,
}

impl RuntimeRegistry {
    pub fn new(connector: Arc<dyn RuntimeConnector>) -> Self {
        Self { connector, handle: Arc::new(Mutex::new(None)) }
    }

    /// Stops the previous handle (if any), then starts and installs a new
    /// one built from `config`. While the swap is in flight no handle is
    /// visible, so concurrent executions fail fast instead of racing a
    /// teardown.
    pub async fn reconfigure(&self, config: &RoomRuntime) -> Result<(), RuntimeError> {
        let mut slot = self.handle.lock().await;
        if let Some(previous) = slot.take() {
            if let Err(err) = previous.stop().await {
                warn!("discarding previous runtime that failed to stop: {err}");
            }
        }
        *slot = Some(self.connector.connect(config).await?);
        Ok(())
    }

    /// The active handle, if one has been started.
    pub async fn current(&self) -> Option<Arc<dyn RuntimeClient>> {
        self.handle.lock().await.clone()
    }

    /// Stops and drops the active handle, e.g. at process shutdown.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(err) = handle.stop().await {
                warn!("runtime failed to stop at shutdown: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct EventLog(StdMutex<Vec<String>>);

    impl EventLog {
        fn push(&self, event: impl Into<String>) {
            self.0.lock().expect("event log lock").push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().expect("event log lock").clone()
        }
    }

    struct ScriptedRuntime {
        name: String,
        log: Arc<EventLog>,
    }

    #[async_trait]
    impl RuntimeClient for ScriptedRuntime {
        async fn execute(&self, _code: &str) -> Result<Vec<Value>, RuntimeError> {
            self.log.push(format!("execute {}", self.name));
            Ok(Vec::new())
        }

        async fn stop(&self) -> Result<(), RuntimeError> {
            self.log.push(format!("stop {}", self.name));
            Ok(())
        }
    }

    struct ScriptedConnector {
        log: Arc<EventLog>,
    }

    #[async_trait]
    impl RuntimeConnector for ScriptedConnector {
        async fn connect(
            &self,
            config: &RoomRuntime,
        ) -> Result<Arc<dyn RuntimeClient>, RuntimeError> {
            let name = config.runtime_id.clone().unwrap_or_else(|| "new".to_owned());
            self.log.push(format!("connect {name}"));
            Ok(Arc::new(ScriptedRuntime { name, log: self.log.clone() }))
        }
    }

    fn registry() -> (RuntimeRegistry, Arc<EventLog>) {
        let log = Arc::new(EventLog::default());
        (RuntimeRegistry::new(Arc::new(ScriptedConnector { log: log.clone() })), log)
    }

    fn config_with_runtime_id(id: &str) -> RoomRuntime {
        RoomRuntime { runtime_id: Some(id.to_owned()), ..RoomRuntime::default() }
    }

    #[tokio::test]
    async fn starts_empty() {
        let (registry, _) = registry();
        assert!(registry.current().await.is_none());
    }

    #[tokio::test]
    async fn reconfigure_stops_old_handle_before_starting_new_one() {
        let (registry, log) = registry();

        registry.reconfigure(&config_with_runtime_id("a")).await.expect("first");
        registry.reconfigure(&config_with_runtime_id("b")).await.expect("second");

        assert_eq!(log.events(), vec!["connect a", "stop a", "connect b"]);
        assert!(registry.current().await.is_some());
    }

    #[tokio::test]
    async fn shutdown_stops_and_clears_the_handle() {
        let (registry, log) = registry();
        registry.reconfigure(&config_with_runtime_id("a")).await.expect("reconfigure");
        registry.shutdown().await;

        assert!(registry.current().await.is_none());
        assert_eq!(log.events(), vec!["connect a", "stop a"]);

        // A second shutdown is a no-op.
        registry.shutdown().await;
        assert_eq!(log.events(), vec!["connect a", "stop a"]);
    }
}
