// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Normalization of raw cell execution outputs.
//!
//! Kernels produce loosely-typed output records (nbformat dictionaries). This
//! module parses each record into a closed [`CellOutput`] variant and renders
//! it as exactly one display string. Parsing and rendering are total: unknown
//! output kinds and missing fields degrade to labeled placeholders instead of
//! failing the surrounding operation.

use std::collections::BTreeMap;

use serde_json::Value;

/// One raw output record from a code cell, tagged by its nbformat
/// `output_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellOutput {
    /// `stream` record (stdout/stderr text).
    Stream { text: String },
    /// `display_data` record: MIME type to payload mapping.
    DisplayData { data: BTreeMap<String, Value> },
    /// `execute_result` record: MIME type to payload mapping.
    ExecuteResult { data: BTreeMap<String, Value> },
    /// `error` record with a joined traceback.
    Error { traceback: String },
    /// Anything else, captured by its kind tag.
    Unknown { output_type: String },
}

impl CellOutput {
    /// Parses an arbitrary JSON value into a [`CellOutput`]. Never fails:
    /// records that do not look like any known output shape land in
    /// [`CellOutput::Unknown`].
    pub fn parse(record: &Value) -> Self {
        let output_type = record.get("output_type").and_then(Value::as_str);
        match output_type {
            Some("stream") => {
                Self::Stream { text: record.get("text").map(join_text).unwrap_or_default() }
            }
            Some(kind @ ("display_data" | "execute_result")) => {
                let data = record
                    .get("data")
                    .and_then(Value::as_object)
                    .map(|data| data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();
                if kind == "display_data" {
                    Self::DisplayData { data }
                } else {
                    Self::ExecuteResult { data }
                }
            }
            Some("error") => {
                Self::Error { traceback: record.get("traceback").map(join_lines).unwrap_or_default() }
            }
            Some(other) => Self::Unknown { output_type: other.to_owned() },
            None => Self::Unknown { output_type: "none".to_owned() },
        }
    }

    /// Renders the record as one display string.
    ///
    /// MIME payloads are inspected in priority order: `text/plain` verbatim,
    /// then fixed placeholders for `text/html` and `image/png`, then a
    /// descriptive fallback naming the kind and the available payload keys.
    pub fn normalize(&self) -> String {
        match self {
            Self::Stream { text } => text.clone(),
            Self::DisplayData { data } => normalize_data(data, "display_data"),
            Self::ExecuteResult { data } => normalize_data(data, "execute_result"),
            Self::Error { traceback } => traceback.clone(),
            Self::Unknown { output_type } => format!("[Unknown output type: {output_type}]"),
        }
    }
}

/// Parses and renders one raw record in a single step.
pub fn extract_output(record: &Value) -> String {
    CellOutput::parse(record).normalize()
}

/// Normalizes a cell's full output sequence, one string per record, order
/// preserved.
pub fn extract_outputs(records: &[Value]) -> Vec<String> {
    records.iter().map(extract_output).collect()
}

fn normalize_data(data: &BTreeMap<String, Value>, kind: &str) -> String {
    if let Some(text) = data.get("text/plain") {
        join_text(text)
    } else if data.contains_key("text/html") {
        "[HTML Output]".to_owned()
    } else if data.contains_key("image/png") {
        "[Image Output (PNG)]".to_owned()
    } else {
        let keys = data.keys().collect::<Vec<_>>();
        format!("[{kind} Data: keys={keys:?}]")
    }
}

/// nbformat text fields are either a plain string or a list of lines (each
/// line carrying its own trailing newline); both flatten to one string.
fn join_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|part| match part {
                Value::String(line) => line.clone(),
                other => other.to_string(),
            })
            .collect(),
        other => other.to_string(),
    }
}

/// Tracebacks are line sequences; join with newlines so every record yields
/// exactly one string.
fn join_lines(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(lines) => lines
            .iter()
            .map(|line| match line {
                Value::String(line) => line.as_str().to_owned(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}
