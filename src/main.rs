/// Navi MCP Server Entry Point
///
/// Loads configuration from the environment, builds the tool registry and
/// starts the configured transports (see `core::config` for variables).
///
/// Logging goes to stderr so stdout stays clean for the STDIO transport.
/// Set RUST_LOG to adjust verbosity and LOG_FORMAT=json for JSON lines.

mod core;
mod tools;

use std::io;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::config::{Config, TransportMode};
use crate::core::server;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    init_tracing();

    let config = Config::from_env().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let dispatcher = server::build_dispatcher(&config).map_err(|e| {
        tracing::error!(error = %e, "failed to build HTTP client");
        io::Error::other(e)
    })?;

    match config.transport {
        TransportMode::Stdio => server::run_server_stdio(dispatcher).await,
        TransportMode::Http => server::run_server_http(config, dispatcher).await,
        TransportMode::Both => {
            // STDIO runs in the background; HTTP owns the process lifetime.
            let stdio_dispatcher = dispatcher.clone();
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(stdio_dispatcher).await {
                    tracing::error!(error = %e, "STDIO server error");
                }
            });

            let http_result = server::run_server_http(config, dispatcher).await;
            stdio_handle.abort();
            http_result
        }
    }
}
