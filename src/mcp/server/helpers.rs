// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

/// Validates a 0-based index against the current cell count.
///
/// The error carries the requested index and the actual count so callers can
/// re-read the document and retry.
fn check_index(cell_index: i64, cell_count: usize) -> Result<usize, ErrorData> {
    if cell_index >= 0 && (cell_index as usize) < cell_count {
        Ok(cell_index as usize)
    } else {
        Err(ErrorData::invalid_params(
            format!("Cell index {cell_index} is out of range. Notebook has {cell_count} cells."),
            Some(serde_json::json!({
                "cell_index": cell_index,
                "cell_count": cell_count as u64,
            })),
        ))
    }
}

/// Releases a session, surfacing close failures as tool errors.
async fn close_session(session: Box<dyn RoomSession>) -> Result<(), ErrorData> {
    session.close().await.map_err(room_error)
}

fn room_error(err: RoomError) -> ErrorData {
    ErrorData::internal_error(err.to_string(), None)
}

fn exec_error(err: ExecError) -> ErrorData {
    match err {
        ExecError::NoRuntime => ErrorData::invalid_request(
            "no runtime is currently available - connect a runtime before executing cells",
            None,
        ),
        ExecError::Runtime(err) => ErrorData::internal_error(err.to_string(), None),
    }
}

fn cell_descriptor(index: usize, cell: &Cell) -> CellDescriptor {
    CellDescriptor {
        index: index as u64,
        cell_type: cell.cell_type.as_str().to_owned(),
        source: cell.source.clone(),
        outputs: (cell.cell_type == CellType::Code).then(|| extract_outputs(cell.outputs())),
    }
}
