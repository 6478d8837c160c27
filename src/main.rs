// Copyright (c) 2025-2026 Datalayer, Inc.
//
// BSD 3-Clause License

//! Jupyter MCP CLI entrypoint.
//!
//! `start` runs the server over stdio (default) or streamable HTTP at
//! `http://0.0.0.0:<port>/mcp`, with `/api/connect` and `/api/healthz` on the
//! same router. `connect` points an already-running server at a different
//! room/runtime.
//!
//! Every flag falls back to an environment variable (`TRANSPORT`, `PORT`,
//! `PROVIDER`, `ROOM_URL`, `ROOM_ID`, `ROOM_TOKEN`, `RUNTIME_URL`,
//! `RUNTIME_ID`, `RUNTIME_TOKEN`, `START_NEW_RUNTIME`,
//! `JUPYTER_MCP_SERVER_URL`).

use std::error::Error;
use std::sync::Arc;

use log::info;
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};

use jupyter_mcp::api;
use jupyter_mcp::config::{Provider, RoomRuntime};
use jupyter_mcp::context::ServerContext;
use jupyter_mcp::mcp::JupyterMcp;

const DEFAULT_PORT: u16 = 4040;
const DEFAULT_SERVER_URL: &str = "http://localhost:4040";

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} start [--transport stdio|streamable-http] [--port <port>] [connection flags]\n  {program} connect [--jupyter-mcp-server-url <url>] [connection flags]\n\nConnection flags:\n  --provider jupyter|datalayer\n  --room-url <url>          --room-id <path>    --room-token <token>\n  --runtime-url <url>       --runtime-id <id>   --runtime-token <token>\n\n`start` serves MCP over stdio by default; `--transport streamable-http` binds\n`0.0.0.0:<port>` (default {DEFAULT_PORT}) with the MCP service at `/mcp`.\n`--start-new-runtime true|false` (default true) controls whether a kernel is\nstarted at launch.\n\n`connect` sends the connection record to a running server's `/api/connect`\n(default {DEFAULT_SERVER_URL})."
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Stdio,
    StreamableHttp,
}

impl Transport {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "stdio" => Some(Self::Stdio),
            "streamable-http" => Some(Self::StreamableHttp),
            _ => None,
        }
    }
}

/// Room/runtime flags shared by `start` and `connect`. Unset flags fall
/// through to the environment and then to the defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ConnectionFlags {
    provider: Option<Provider>,
    room_url: Option<String>,
    room_id: Option<String>,
    room_token: Option<String>,
    runtime_url: Option<String>,
    runtime_id: Option<String>,
    runtime_token: Option<String>,
}

impl ConnectionFlags {
    /// Consumes `arg` (and its value) if it is a connection flag. `Ok(false)`
    /// means the argument is not ours; duplicates and missing values are
    /// errors.
    fn accept(&mut self, arg: &str, args: &mut dyn Iterator<Item = String>) -> Result<bool, ()> {
        if arg == "--provider" {
            if self.provider.is_some() {
                return Err(());
            }
            self.provider = Some(Provider::parse(&args.next().ok_or(())?).ok_or(())?);
            return Ok(true);
        }
        let slot = match arg {
            "--room-url" => &mut self.room_url,
            "--room-id" => &mut self.room_id,
            "--room-token" => &mut self.room_token,
            "--runtime-url" => &mut self.runtime_url,
            "--runtime-id" => &mut self.runtime_id,
            "--runtime-token" => &mut self.runtime_token,
            _ => return Ok(false),
        };
        if slot.is_some() {
            return Err(());
        }
        *slot = Some(args.next().ok_or(())?);
        Ok(true)
    }

    fn overlay(&self, mut config: RoomRuntime) -> RoomRuntime {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(room_url) = &self.room_url {
            config.room_url = room_url.clone();
        }
        if let Some(room_id) = &self.room_id {
            config.room_id = room_id.clone();
        }
        if let Some(room_token) = &self.room_token {
            config.room_token = Some(room_token.clone());
        }
        if let Some(runtime_url) = &self.runtime_url {
            config.runtime_url = runtime_url.clone();
        }
        if let Some(runtime_id) = &self.runtime_id {
            config.runtime_id = Some(runtime_id.clone());
        }
        if let Some(runtime_token) = &self.runtime_token {
            config.runtime_token = Some(runtime_token.clone());
        }
        config
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct StartOptions {
    transport: Option<Transport>,
    port: Option<u16>,
    start_new_runtime: Option<bool>,
    connection: ConnectionFlags,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ConnectOptions {
    server_url: Option<String>,
    connection: ConnectionFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start(StartOptions),
    Connect(ConnectOptions),
}

fn parse_command(mut args: impl Iterator<Item = String>) -> Result<Command, ()> {
    match args.next().as_deref() {
        Some("start") => parse_start(args).map(Command::Start),
        Some("connect") => parse_connect(args).map(Command::Connect),
        _ => Err(()),
    }
}

fn parse_start(mut args: impl Iterator<Item = String>) -> Result<StartOptions, ()> {
    let mut options = StartOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--transport" => {
                if options.transport.is_some() {
                    return Err(());
                }
                options.transport = Some(Transport::parse(&args.next().ok_or(())?).ok_or(())?);
            }
            "--port" => {
                if options.port.is_some() {
                    return Err(());
                }
                options.port = Some(args.next().ok_or(())?.parse().map_err(|_| ())?);
            }
            "--start-new-runtime" => {
                if options.start_new_runtime.is_some() {
                    return Err(());
                }
                options.start_new_runtime = Some(parse_bool(&args.next().ok_or(())?)?);
            }
            _ => {
                if !options.connection.accept(&arg, &mut args)? {
                    return Err(());
                }
            }
        }
    }

    Ok(options)
}

fn parse_connect(mut args: impl Iterator<Item = String>) -> Result<ConnectOptions, ()> {
    let mut options = ConnectOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--jupyter-mcp-server-url" => {
                if options.server_url.is_some() {
                    return Err(());
                }
                options.server_url = Some(args.next().ok_or(())?);
            }
            _ => {
                if !options.connection.accept(&arg, &mut args)? {
                    return Err(());
                }
            }
        }
    }

    Ok(options)
}

fn parse_bool(tag: &str) -> Result<bool, ()> {
    match tag {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(()),
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

async fn run_start(options: StartOptions) -> Result<(), Box<dyn Error>> {
    let transport = options
        .transport
        .or_else(|| env_var("TRANSPORT").as_deref().and_then(Transport::parse))
        .unwrap_or(Transport::Stdio);
    let port = options
        .port
        .or_else(|| env_var("PORT").and_then(|raw| raw.parse().ok()))
        .unwrap_or(DEFAULT_PORT);
    let start_new_runtime = options
        .start_new_runtime
        .or_else(|| env_var("START_NEW_RUNTIME").and_then(|raw| parse_bool(&raw).ok()))
        .unwrap_or(true);
    let config = options.connection.overlay(RoomRuntime::from_env());

    let ctx = ServerContext::jupyter(config.clone());
    if start_new_runtime || config.runtime_id.is_some() {
        ctx.registry().reconfigure(&config).await?;
    }

    match transport {
        Transport::Stdio => JupyterMcp::new(ctx.clone()).serve_stdio().await?,
        Transport::StreamableHttp => serve_http(ctx.clone(), port).await?,
    }

    ctx.registry().shutdown().await;
    Ok(())
}

async fn serve_http(ctx: ServerContext, port: u16) -> Result<(), Box<dyn Error>> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("serving MCP over streamable HTTP at http://0.0.0.0:{port}/mcp");

    let config = StreamableHttpServerConfig {
        stateful_mode: true,
        ..StreamableHttpServerConfig::default()
    };
    let shutdown_token = config.cancellation_token.clone();

    let session_manager = Arc::new(LocalSessionManager::default());
    let mcp = JupyterMcp::new(ctx.clone());
    let mcp_service = StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config);

    let router = api::routes(ctx).nest_service("/mcp", mcp_service);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_token.cancel();
        })
        .await?;
    Ok(())
}

async fn run_connect(options: ConnectOptions) -> Result<(), Box<dyn Error>> {
    let server_url = options
        .server_url
        .or_else(|| env_var("JUPYTER_MCP_SERVER_URL"))
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned());
    let config = options.connection.overlay(RoomRuntime::from_env());

    let url = format!("{}/api/connect", server_url.trim_end_matches('/'));
    reqwest::Client::new().put(&url).json(&config).send().await?.error_for_status()?;
    println!("connected {} to {server_url}", config.room_id);
    Ok(())
}

fn main() {
    env_logger::init();

    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "jupyter-mcp".to_owned());

        let command = match parse_command(args) {
            Ok(command) => command,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(async {
            match command {
                Command::Start(options) => run_start(options).await,
                Command::Connect(options) => run_connect(options).await,
            }
        })
    })();

    if let Err(err) = result {
        eprintln!("jupyter-mcp: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|arg| (*arg).to_owned()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_bare_start() {
        let command = parse_command(args(&["start"])).expect("parse command");
        assert_eq!(command, Command::Start(StartOptions::default()));
    }

    #[test]
    fn parses_start_transport_and_port() {
        let Command::Start(options) = parse_command(args(&[
            "start",
            "--transport",
            "streamable-http",
            "--port",
            "8080",
        ]))
        .expect("parse command") else {
            panic!("expected start");
        };
        assert_eq!(options.transport, Some(Transport::StreamableHttp));
        assert_eq!(options.port, Some(8080));
        assert_eq!(options.start_new_runtime, None);
    }

    #[test]
    fn parses_start_connection_flags() {
        let Command::Start(options) = parse_command(args(&[
            "start",
            "--provider",
            "datalayer",
            "--room-url",
            "https://rooms.example.org",
            "--room-id",
            "work/analysis.ipynb",
            "--runtime-id",
            "k-1",
            "--start-new-runtime",
            "false",
        ]))
        .expect("parse command") else {
            panic!("expected start");
        };
        assert_eq!(options.connection.provider, Some(Provider::Datalayer));
        assert_eq!(options.connection.room_id.as_deref(), Some("work/analysis.ipynb"));
        assert_eq!(options.connection.runtime_id.as_deref(), Some("k-1"));
        assert_eq!(options.start_new_runtime, Some(false));
    }

    #[test]
    fn parses_connect_with_server_url() {
        let Command::Connect(options) = parse_command(args(&[
            "connect",
            "--jupyter-mcp-server-url",
            "http://localhost:4242",
            "--room-id",
            "demo.ipynb",
        ]))
        .expect("parse command") else {
            panic!("expected connect");
        };
        assert_eq!(options.server_url.as_deref(), Some("http://localhost:4242"));
        assert_eq!(options.connection.room_id.as_deref(), Some("demo.ipynb"));
    }

    #[test]
    fn rejects_missing_subcommand() {
        parse_command(std::iter::empty()).unwrap_err();
        parse_command(args(&["serve"])).unwrap_err();
    }

    #[test]
    fn rejects_unknown_flags() {
        parse_command(args(&["start", "--nope"])).unwrap_err();
        parse_command(args(&["connect", "--transport", "stdio"])).unwrap_err();
    }

    #[test]
    fn rejects_duplicate_flags() {
        parse_command(args(&["start", "--port", "1", "--port", "2"])).unwrap_err();
        parse_command(args(&["start", "--room-id", "a", "--room-id", "b"])).unwrap_err();
    }

    #[test]
    fn rejects_missing_values() {
        parse_command(args(&["start", "--port"])).unwrap_err();
        parse_command(args(&["connect", "--room-token"])).unwrap_err();
    }

    #[test]
    fn rejects_invalid_values() {
        parse_command(args(&["start", "--transport", "sse"])).unwrap_err();
        parse_command(args(&["start", "--provider", "binder"])).unwrap_err();
        parse_command(args(&["start", "--port", "not-a-port"])).unwrap_err();
        parse_command(args(&["start", "--start-new-runtime", "yes"])).unwrap_err();
    }

    #[test]
    fn overlay_applies_flags_over_the_base_config() {
        let flags = ConnectionFlags {
            provider: Some(Provider::Datalayer),
            room_id: Some("work/analysis.ipynb".to_owned()),
            runtime_token: Some("rt-token".to_owned()),
            ..ConnectionFlags::default()
        };

        let config = flags.overlay(RoomRuntime::default());
        assert_eq!(config.provider, Provider::Datalayer);
        assert_eq!(config.room_id, "work/analysis.ipynb");
        assert_eq!(config.runtime_token.as_deref(), Some("rt-token"));
        // Untouched fields keep their defaults.
        assert_eq!(config.room_url, "http://localhost:8888");
        assert!(config.runtime_id.is_none());
    }
}
