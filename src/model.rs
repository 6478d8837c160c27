// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Notebook document model.
//!
//! A light nbformat mapping: just enough structure for ordered cell access
//! and mutation, with unknown fields carried through untouched so a document
//! fetched from a room can be written back without loss.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Cell type tag. Unknown tags are preserved verbatim for round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
    Other(String),
}

impl CellType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
            Self::Raw => "raw",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for CellType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "code" => Self::Code,
            "markdown" => Self::Markdown,
            "raw" => Self::Raw,
            _ => Self::Other(tag),
        }
    }
}

impl From<CellType> for String {
    fn from(cell_type: CellType) -> Self {
        cell_type.as_str().to_owned()
    }
}

/// One notebook cell.
///
/// `outputs` is `Some` for code cells (possibly empty) and `None` for
/// markdown/raw cells, mirroring nbformat's conditional `outputs` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub cell_type: CellType,
    #[serde(with = "source_text", default)]
    pub source: String,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Cell {
    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            cell_type: CellType::Markdown,
            source: source.into(),
            metadata: empty_object(),
            outputs: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn code(source: impl Into<String>) -> Self {
        let mut extra = BTreeMap::new();
        // nbformat requires the key on code cells even before a first run.
        extra.insert("execution_count".to_owned(), Value::Null);
        Self {
            id: Some(Uuid::new_v4().to_string()),
            cell_type: CellType::Code,
            source: source.into(),
            metadata: empty_object(),
            outputs: Some(Vec::new()),
            extra,
        }
    }

    /// Raw output records of the most recent execution; empty for non-code
    /// cells.
    pub fn outputs(&self) -> &[Value] {
        self.outputs.as_deref().unwrap_or(&[])
    }
}

/// A full notebook document as served by the room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Notebook {
    /// Structural edits. Callers validate indices; these methods assume
    /// `index` is in range.
    pub fn insert_markdown(&mut self, index: usize, source: &str) {
        self.cells.insert(index, Cell::markdown(source));
    }

    pub fn append_markdown(&mut self, source: &str) {
        self.cells.push(Cell::markdown(source));
    }

    pub fn insert_code(&mut self, index: usize, source: &str) -> usize {
        self.cells.insert(index, Cell::code(source));
        index
    }

    pub fn append_code(&mut self, source: &str) -> usize {
        self.cells.push(Cell::code(source));
        self.cells.len() - 1
    }

    pub fn set_source(&mut self, index: usize, source: &str) {
        self.cells[index].source = source.to_owned();
    }

    /// Replaces the cell's output sequence with the records of a fresh run.
    pub fn set_outputs(&mut self, index: usize, outputs: Vec<Value>) {
        self.cells[index].outputs = Some(outputs);
    }

    pub fn delete(&mut self, index: usize) -> Cell {
        self.cells.remove(index)
    }
}

impl Default for Notebook {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            metadata: empty_object(),
            nbformat: default_nbformat(),
            nbformat_minor: default_nbformat_minor(),
            extra: BTreeMap::new(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_nbformat() -> u32 {
    4
}

fn default_nbformat_minor() -> u32 {
    5
}

/// nbformat sources are either a plain string or a list of lines; both read
/// as one string, and we always write the plain-string form back.
mod source_text {
    use serde::de::{Deserializer, Error};
    use serde::ser::Serializer;
    use serde::Deserialize;
    use serde_json::Value;

    pub fn serialize<S: Serializer>(source: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(source)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(source) => Ok(source),
            Value::Array(lines) => {
                let mut source = String::new();
                for line in lines {
                    match line {
                        Value::String(line) => source.push_str(&line),
                        other => return Err(D::Error::custom(format!(
                            "expected source line string, got {other}"
                        ))),
                    }
                }
                Ok(source)
            }
            Value::Null => Ok(String::new()),
            other => Err(D::Error::custom(format!("expected cell source, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_source_given_as_line_list() {
        let cell: Cell = serde_json::from_value(json!({
            "cell_type": "code",
            "source": ["x = 1\n", "x + 1"],
            "metadata": {},
            "execution_count": 2,
            "outputs": [],
        }))
        .expect("cell");
        assert_eq!(cell.cell_type, CellType::Code);
        assert_eq!(cell.source, "x = 1\nx + 1");
        assert_eq!(cell.extra.get("execution_count"), Some(&json!(2)));
    }

    #[test]
    fn parses_source_given_as_string() {
        let cell: Cell = serde_json::from_value(json!({
            "cell_type": "markdown",
            "source": "# Title",
            "metadata": {},
        }))
        .expect("cell");
        assert_eq!(cell.cell_type, CellType::Markdown);
        assert_eq!(cell.source, "# Title");
        assert!(cell.outputs.is_none());
    }

    #[test]
    fn preserves_unknown_cell_types_and_extra_fields() {
        let raw = json!({
            "cell_type": "sql",
            "source": "select 1",
            "metadata": {"collapsed": true},
            "attachments": {"a.png": {}},
        });
        let cell: Cell = serde_json::from_value(raw).expect("cell");
        assert_eq!(cell.cell_type, CellType::Other("sql".to_owned()));

        let back = serde_json::to_value(&cell).expect("serialize");
        assert_eq!(back["cell_type"], "sql");
        assert_eq!(back["attachments"], json!({"a.png": {}}));
        assert_eq!(back["metadata"], json!({"collapsed": true}));
    }

    #[test]
    fn code_constructor_produces_valid_nbformat_shape() {
        let cell = Cell::code("1+1");
        let value = serde_json::to_value(&cell).expect("serialize");
        assert_eq!(value["cell_type"], "code");
        assert_eq!(value["source"], "1+1");
        assert_eq!(value["outputs"], json!([]));
        assert_eq!(value["execution_count"], Value::Null);
        assert!(value["id"].is_string());
    }

    #[test]
    fn markdown_constructor_has_no_outputs_key() {
        let value = serde_json::to_value(Cell::markdown("# T")).expect("serialize");
        assert!(value.get("outputs").is_none());
    }

    #[test]
    fn notebook_round_trips_document_level_fields() {
        let raw = json!({
            "cells": [],
            "metadata": {"kernelspec": {"name": "python3"}},
            "nbformat": 4,
            "nbformat_minor": 4,
        });
        let notebook: Notebook = serde_json::from_value(raw.clone()).expect("notebook");
        assert_eq!(notebook.nbformat_minor, 4);
        assert_eq!(serde_json::to_value(&notebook).expect("serialize"), raw);
    }
}
