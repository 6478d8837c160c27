// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! In-process room implementation.
//!
//! Backs the coordinator test suites with a shared notebook document while
//! honoring the same open/edit/close session contract as the real gateway:
//! sessions edit a working copy and publish it on close, last writer wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RoomRuntime;
use crate::model::{Cell, Notebook};

use super::{RoomClient, RoomError, RoomSession};

#[derive(Debug, Clone, Default)]
pub struct MemoryRooms {
    doc: Arc<Mutex<Notebook>>,
    unreachable: Arc<AtomicBool>,
}

impl MemoryRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notebook(notebook: Notebook) -> Self {
        Self { doc: Arc::new(Mutex::new(notebook)), unreachable: Arc::default() }
    }

    /// Makes subsequent `open` calls fail with a connection error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Current document state, read without a session.
    pub fn snapshot(&self) -> Notebook {
        self.doc.lock().expect("room document lock").clone()
    }
}

#[async_trait]
impl RoomClient for MemoryRooms {
    async fn open(&self, config: &RoomRuntime) -> Result<Box<dyn RoomSession>, RoomError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RoomError::Connect {
                room_id: config.room_id.clone(),
                reason: "room is unreachable".to_owned(),
            });
        }
        let notebook = self.doc.lock().expect("room document lock").clone();
        Ok(Box::new(MemoryRoomSession { doc: self.doc.clone(), notebook, dirty: false }))
    }
}

struct MemoryRoomSession {
    doc: Arc<Mutex<Notebook>>,
    notebook: Notebook,
    dirty: bool,
}

#[async_trait]
impl RoomSession for MemoryRoomSession {
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
        if self.dirty {
            *self.doc.lock().expect("room document lock") = self.notebook;
        }
        Ok(())
    }
}
