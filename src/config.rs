// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Session configuration: which room and which runtime the server talks to.
//!
//! There is exactly one active configuration per process. It is seeded from
//! CLI options and environment variables at startup and replaced wholesale by
//! `PUT /api/connect`; nothing is ever merged field-by-field.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ROOM_URL: &str = "http://localhost:8888";
pub const DEFAULT_ROOM_ID: &str = "notebook.ipynb";
pub const DEFAULT_RUNTIME_URL: &str = "http://localhost:8888";

/// Backend implementing the room and runtime protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Jupyter,
    Datalayer,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jupyter => "jupyter",
            Self::Datalayer => "datalayer",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "jupyter" => Some(Self::Jupyter),
            "datalayer" => Some(Self::Datalayer),
            _ => None,
        }
    }

    /// `Authorization` header value for this backend's auth scheme.
    pub fn authorization(self, token: &str) -> String {
        match self {
            Self::Jupyter => format!("token {token}"),
            Self::Datalayer => format!("Bearer {token}"),
        }
    }
}

/// The full room + runtime connection record.
///
/// This is both the process-wide mutable configuration and the wire payload
/// of `PUT /api/connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RoomRuntime {
    pub provider: Provider,
    pub room_url: String,
    /// Notebook path within the room service.
    pub room_id: String,
    #[serde(default)]
    pub room_token: Option<String>,
    pub runtime_url: String,
    /// Existing kernel id; when absent a new kernel is started on demand.
    #[serde(default)]
    pub runtime_id: Option<String>,
    #[serde(default)]
    pub runtime_token: Option<String>,
}

impl Default for RoomRuntime {
    fn default() -> Self {
        Self {
            provider: Provider::Jupyter,
            room_url: DEFAULT_ROOM_URL.to_owned(),
            room_id: DEFAULT_ROOM_ID.to_owned(),
            room_token: None,
            runtime_url: DEFAULT_RUNTIME_URL.to_owned(),
            runtime_id: None,
            runtime_token: None,
        }
    }
}

impl RoomRuntime {
    /// Defaults overlaid with the process environment (`PROVIDER`,
    /// `ROOM_URL`, `ROOM_ID`, `ROOM_TOKEN`, `RUNTIME_URL`, `RUNTIME_ID`,
    /// `RUNTIME_TOKEN`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(provider) = env_var("PROVIDER").as_deref().and_then(Provider::parse) {
            config.provider = provider;
        }
        if let Some(room_url) = env_var("ROOM_URL") {
            config.room_url = room_url;
        }
        if let Some(room_id) = env_var("ROOM_ID") {
            config.room_id = room_id;
        }
        config.room_token = env_var("ROOM_TOKEN");
        if let Some(runtime_url) = env_var("RUNTIME_URL") {
            config.runtime_url = runtime_url;
        }
        config.runtime_id = env_var("RUNTIME_ID");
        config.runtime_token = env_var("RUNTIME_TOKEN");
        config
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
