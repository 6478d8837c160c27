// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

use std::collections::BTreeMap;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};

use crate::context::ServerContext;
use crate::exec::{self, ExecError};
use crate::model::{Cell, CellType};
use crate::output::extract_outputs;
use crate::room::{RoomError, RoomSession};

use super::types::*;

/// The notebook operation coordinator.
///
/// Every tool follows the same template: open a session against the shared
/// document, validate indices, perform the mutation/query/execution, read
/// back and normalize outputs, and close the session — on every exit path,
/// including validation and execution failures.
#[derive(Clone)]
pub struct JupyterMcp {
    ctx: ServerContext,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl JupyterMcp {
    pub fn new(ctx: ServerContext) -> Self {
        Self { ctx, tool_router: Self::tool_router() }
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    async fn open_session(&self) -> Result<Box<dyn RoomSession>, ErrorData> {
        self.ctx.open_session().await.map_err(room_error)
    }

    /// Runs an already-validated cell against the active runtime and returns
    /// the normalized outputs read back from the document.
    async fn run_cell(
        &self,
        session: &mut dyn RoomSession,
        index: usize,
    ) -> Result<Vec<String>, ErrorData> {
        let runtime = exec::require_runtime(self.ctx.registry()).await.map_err(exec_error)?;
        exec::execute_cell(session, index, runtime.as_ref()).await.map_err(exec_error)?;
        Ok(extract_outputs(session.cell(index).outputs()))
    }

    async fn insert_and_run(
        &self,
        session: &mut dyn RoomSession,
        cell_index: i64,
        cell_source: &str,
    ) -> Result<Vec<String>, ErrorData> {
        let index = check_index(cell_index, session.cell_count())?;
        session.insert_code(index, cell_source);
        self.run_cell(session, index).await
    }

    async fn run_existing(
        &self,
        session: &mut dyn RoomSession,
        cell_index: i64,
    ) -> Result<Vec<String>, ErrorData> {
        let index = check_index(cell_index, session.cell_count())?;
        self.run_cell(session, index).await
    }

    /// Append a markdown cell with the provided source at the end of the
    /// notebook.
    #[tool(name = "append_markdown_cell")]
    async fn append_markdown_cell(
        &self,
        params: Parameters<AppendMarkdownCellParams>,
    ) -> Result<Json<AckResponse>, ErrorData> {
        let AppendMarkdownCellParams { cell_source } = params.0;

        let mut session = self.open_session().await?;
        session.append_markdown(&cell_source);
        close_session(session).await?;

        Ok(Json(AckResponse { message: "Jupyter Markdown cell added.".to_owned() }))
    }

    /// Insert a markdown cell at the given 0-based index.
    #[tool(name = "insert_markdown_cell")]
    async fn insert_markdown_cell(
        &self,
        params: Parameters<InsertMarkdownCellParams>,
    ) -> Result<Json<AckResponse>, ErrorData> {
        let InsertMarkdownCellParams { cell_index, cell_source } = params.0;

        let mut session = self.open_session().await?;
        let result = check_index(cell_index, session.cell_count()).map(|index| {
            session.insert_markdown(index, &cell_source);
            index
        });
        let closed = close_session(session).await;
        let index = result?;
        closed?;

        Ok(Json(AckResponse { message: format!("Jupyter Markdown cell {index} inserted.") }))
    }

    /// Overwrite the source of an existing cell. Does not execute the
    /// modified cell; use `execute_cell` afterwards if it is code.
    #[tool(name = "overwrite_cell_source")]
    async fn overwrite_cell_source(
        &self,
        params: Parameters<OverwriteCellSourceParams>,
    ) -> Result<Json<AckResponse>, ErrorData> {
        let OverwriteCellSourceParams { cell_index, cell_source } = params.0;

        let mut session = self.open_session().await?;
        let result = check_index(cell_index, session.cell_count()).map(|index| {
            session.set_source(index, &cell_source);
            index
        });
        let closed = close_session(session).await;
        let index = result?;
        closed?;

        Ok(Json(AckResponse {
            message: format!(
                "Cell {index} overwritten successfully - use execute_cell to execute it if code"
            ),
        }))
    }

    /// Append a code cell at the end of the notebook and execute it.
    #[tool(name = "append_execute_code_cell")]
    async fn append_execute_code_cell(
        &self,
        params: Parameters<AppendExecuteCodeCellParams>,
    ) -> Result<Json<ExecuteResponse>, ErrorData> {
        let AppendExecuteCodeCellParams { cell_source } = params.0;

        let mut session = self.open_session().await?;
        let index = session.append_code(&cell_source);
        let result = self.run_cell(session.as_mut(), index).await;
        let closed = close_session(session).await;
        let outputs = result?;
        closed?;

        Ok(Json(ExecuteResponse { outputs }))
    }

    /// Insert a code cell at the given 0-based index and execute it.
    #[tool(name = "insert_execute_code_cell")]
    async fn insert_execute_code_cell(
        &self,
        params: Parameters<InsertExecuteCodeCellParams>,
    ) -> Result<Json<ExecuteResponse>, ErrorData> {
        let InsertExecuteCodeCellParams { cell_index, cell_source } = params.0;

        let mut session = self.open_session().await?;
        let result = self.insert_and_run(session.as_mut(), cell_index, &cell_source).await;
        let closed = close_session(session).await;
        let outputs = result?;
        closed?;

        Ok(Json(ExecuteResponse { outputs }))
    }

    /// Execute an existing cell in place and return its normalized outputs.
    #[tool(name = "execute_cell")]
    async fn execute_cell(
        &self,
        params: Parameters<CellIndexParams>,
    ) -> Result<Json<ExecuteResponse>, ErrorData> {
        let CellIndexParams { cell_index } = params.0;

        let mut session = self.open_session().await?;
        let result = self.run_existing(session.as_mut(), cell_index).await;
        let closed = close_session(session).await;
        let outputs = result?;
        closed?;

        Ok(Json(ExecuteResponse { outputs }))
    }

    /// Read all cells: index, type, source, and normalized outputs for code
    /// cells.
    #[tool(name = "read_all_cells")]
    async fn read_all_cells(&self) -> Result<Json<ReadAllCellsResponse>, ErrorData> {
        let session = self.open_session().await?;
        let cells = (0..session.cell_count())
            .map(|index| cell_descriptor(index, session.cell(index)))
            .collect();
        close_session(session).await?;

        Ok(Json(ReadAllCellsResponse { cells }))
    }

    /// Read one cell by its 0-based index.
    #[tool(name = "read_cell")]
    async fn read_cell(
        &self,
        params: Parameters<CellIndexParams>,
    ) -> Result<Json<CellDescriptor>, ErrorData> {
        let CellIndexParams { cell_index } = params.0;

        let session = self.open_session().await?;
        let result = check_index(cell_index, session.cell_count())
            .map(|index| cell_descriptor(index, session.cell(index)));
        let closed = close_session(session).await;
        let descriptor = result?;
        closed?;

        Ok(Json(descriptor))
    }

    /// Get the notebook's total cell count and per-type cell counts.
    #[tool(name = "get_notebook_info")]
    async fn get_notebook_info(&self) -> Result<Json<NotebookInfoResponse>, ErrorData> {
        let room_id = self.ctx.config().await.room_id;

        let session = self.open_session().await?;
        let total_cells = session.cell_count() as u64;
        let mut cell_types = BTreeMap::new();
        for index in 0..session.cell_count() {
            let tag = session.cell(index).cell_type.as_str().to_owned();
            *cell_types.entry(tag).or_insert(0u64) += 1;
        }
        close_session(session).await?;

        Ok(Json(NotebookInfoResponse { room_id, total_cells, cell_types }))
    }

    /// Delete the cell at the given 0-based index.
    #[tool(name = "delete_cell")]
    async fn delete_cell(
        &self,
        params: Parameters<CellIndexParams>,
    ) -> Result<Json<AckResponse>, ErrorData> {
        let CellIndexParams { cell_index } = params.0;

        let mut session = self.open_session().await?;
        let result =
            check_index(cell_index, session.cell_count()).map(|index| (index, session.delete(index)));
        let closed = close_session(session).await;
        let (index, cell) = result?;
        closed?;

        Ok(Json(AckResponse {
            message: format!(
                "Cell {index} ({}) deleted successfully.",
                cell.cell_type.as_str()
            ),
        }))
    }
}

#[tool_handler]
impl ServerHandler for JupyterMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Jupyter notebook coordination server (tools: append_markdown_cell, insert_markdown_cell, overwrite_cell_source, append_execute_code_cell, insert_execute_code_cell, execute_cell, read_all_cells, read_cell, get_notebook_info, delete_cell)"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// Extracted validation/mapping helpers for the tool handlers.
include!("server/helpers.rs");
