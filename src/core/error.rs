/// Error Types
///
/// Failures that cross a component boundary are typed here. Tool handlers
/// return `ToolError` for faults the caller must turn into a protocol error
/// (upstream unreachable, bad payload, panics). Validation problems and
/// "not found" outcomes are not errors: they are ordinary `ToolResult`s.

use thiserror::Error;

/// Failure raised by a tool handler or the table source it reads from.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Transport-level failure talking to a remote table (DNS, TLS, timeout).
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The remote table answered with a non-success HTTP status.
    #[error("upstream {url} returned HTTP {status}")]
    UpstreamStatus { status: u16, url: String },

    /// The remote table answered, but not with rows.
    #[error("unexpected upstream payload: {0}")]
    Payload(String),

    /// The handler itself failed (including panics caught by the dispatcher).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Why a registry call produced no `ToolResult`.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Invalid start-up configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid transport mode '{0}', expected 'stdio', 'http' or 'both'")]
    TransportMode(String),

    #[error("{var} is not an http(s) URL: {value}")]
    Url { var: &'static str, value: String },
}
