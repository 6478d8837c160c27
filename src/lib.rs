// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Jupyter MCP — notebook coordination over the Model Context Protocol.
//!
//! The server mediates between MCP clients and two Jupyter-side services: a
//! room holding the shared notebook document and a runtime (kernel) executing
//! code. Every tool invocation opens a bounded-lifetime session against the
//! room, mutates or reads the ordered cell list, optionally dispatches code
//! to the runtime, and closes the session on every exit path.

pub mod api;
pub mod config;
pub mod context;
pub mod exec;
pub mod mcp;
pub mod model;
pub mod output;
pub mod room;
pub mod runtime;
