// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Execution dispatch: run one cell against the active runtime.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::room::RoomSession;
use crate::runtime::{RuntimeClient, RuntimeError, RuntimeRegistry};

#[derive(Debug, Error)]
pub enum ExecError {
    /// No runtime handle is registered; connect a runtime first.
    #[error("no runtime is currently available")]
    NoRuntime,

    /// The runtime connection failed mid-execution.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// The active runtime handle, or [`ExecError::NoRuntime`].
///
/// Coordinators call this before dispatching so execution fails fast instead
/// of being submitted to nothing.
pub async fn require_runtime(
    registry: &RuntimeRegistry,
) -> Result<Arc<dyn RuntimeClient>, ExecError> {
    registry.current().await.ok_or(ExecError::NoRuntime)
}

/// Runs the cell at `index` and overwrites its output records with the
/// results of this run. Synchronous from the caller's perspective: returns
/// only once the runtime finished and the records are visible through the
/// session.
///
/// The index must already be validated against the session's cell count.
pub async fn execute_cell(
    session: &mut dyn RoomSession,
    index: usize,
    runtime: &dyn RuntimeClient,
) -> Result<Vec<Value>, ExecError> {
    let code = session.cell(index).source.clone();
    let outputs = runtime.execute(&code).await?;
    session.set_outputs(index, outputs.clone());
    Ok(outputs)
}
