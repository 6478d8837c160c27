// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Session gateway to the shared notebook document.
//!
//! Every coordinator operation opens its own bounded-lifetime [`RoomSession`]
//! against the room, edits the ordered cell list through it, and closes it on
//! every exit path. The gateway deliberately knows nothing about conflict
//! resolution; concurrent edits are the room service's problem.

pub mod jupyter;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::RoomRuntime;
use crate::model::Cell;

pub use jupyter::JupyterRooms;
pub use memory::MemoryRooms;

#[derive(Debug, Error)]
pub enum RoomError {
    /// The room is unreachable or rejected the credentials/path.
    #[error("cannot open room {room_id}: {reason}")]
    Connect { room_id: String, reason: String },

    /// The session could not be released cleanly (edits may be lost).
    #[error("cannot close room {room_id}: {reason}")]
    Close { room_id: String, reason: String },
}

/// Connector able to open live sessions against a room.
#[async_trait]
pub trait RoomClient: Send + Sync {
    async fn open(&self, config: &RoomRuntime) -> Result<Box<dyn RoomSession>, RoomError>;
}

/// One open session: ordered, indexable access to the cell list.
///
/// A session is exclusively owned by a single in-flight operation and must be
/// closed exactly once. Mutators assume the index was validated against
/// [`RoomSession::cell_count`] by the caller.
#[async_trait]
pub trait RoomSession: Send {
    fn cell_count(&self) -> usize;

    fn cell(&self, index: usize) -> &Cell;

    fn insert_markdown(&mut self, index: usize, source: &str);

    fn append_markdown(&mut self, source: &str);

    /// Returns the index of the inserted cell.
    fn insert_code(&mut self, index: usize, source: &str) -> usize;

    /// Returns the index of the appended cell.
    fn append_code(&mut self, source: &str) -> usize;

    fn set_source(&mut self, index: usize, source: &str);

    /// Overwrites the cell's output records with those of a fresh run.
    fn set_outputs(&mut self, index: usize, outputs: Vec<Value>);

    /// Removes and returns the cell at `index`.
    fn delete(&mut self, index: usize) -> Cell;

    /// Releases the session, publishing buffered edits to the room.
    async fn close(self: Box<Self>) -> Result<(), RoomError>;
}
