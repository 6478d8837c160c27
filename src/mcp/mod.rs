// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Model Context Protocol (MCP) server surface.
//!
//! One tool per notebook operation; every tool runs its own open-session →
//! act → close-session cycle against the configured room.

mod server;
mod types;

pub use server::JupyterMcp;
