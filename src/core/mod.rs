/// Core Server Framework Module
///
/// - config.rs: environment configuration
/// - protocol.rs: JSON-RPC / MCP wire types
/// - registry.rs: tool registry and handler type
/// - dispatcher.rs: method routing shared by every transport
/// - session.rs: SSE keep-alive streams
/// - server.rs: HTTP and STDIO transports
/// - error.rs: error types

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
