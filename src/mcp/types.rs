// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AppendMarkdownCellParams {
    /// Markdown source.
    pub cell_source: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertMarkdownCellParams {
    /// Index of the cell to insert (0-based).
    pub cell_index: i64,
    /// Markdown source.
    pub cell_source: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OverwriteCellSourceParams {
    /// Index of the cell to overwrite (0-based).
    pub cell_index: i64,
    /// New cell source; must match the existing cell type.
    pub cell_source: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AppendExecuteCodeCellParams {
    /// Code source.
    pub cell_source: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertExecuteCodeCellParams {
    /// Index of the cell to insert (0-based).
    pub cell_index: i64,
    /// Code source.
    pub cell_source: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CellIndexParams {
    /// Index of the cell (0-based).
    pub cell_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AckResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteResponse {
    /// Normalized outputs of the executed cell, in order.
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellDescriptor {
    pub index: u64,
    #[serde(rename = "type")]
    pub cell_type: String,
    pub source: String,
    /// Normalized outputs; present for code cells only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadAllCellsResponse {
    pub cells: Vec<CellDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotebookInfoResponse {
    pub room_id: String,
    pub total_cells: u64,
    /// Cell count per type tag.
    pub cell_types: BTreeMap<String, u64>,
}
