/// Protocol Dispatcher
///
/// Turns one decoded JSON-RPC request into exactly one JSON-RPC response.
/// Every transport adapter (SSE POST, stdio) feeds the same `Dispatcher`;
/// it keeps no state between calls.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::core::error::CallError;
use crate::core::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, MCPRequest, MCPResponse, METHOD_NOT_FOUND, PROTOCOL_VERSION,
};
use crate::core::registry::ToolRegistry;

/// Server identity reported by `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Clone)]
pub struct Dispatcher {
    info: ServerInfo,
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(info: ServerInfo, registry: Arc<ToolRegistry>) -> Self {
        Self { info, registry }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Route a request to its method handler.
    ///
    /// Never fails: unknown methods, bad params and tool failures all become
    /// JSON-RPC error responses carrying the request id.
    pub async fn dispatch(&self, req: MCPRequest) -> MCPResponse {
        tracing::debug!(method = %req.method, id = ?req.id, "dispatching");
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id),
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req.id, req.params).await,
            _ => {
                tracing::debug!(method = %req.method, "method not found");
                MCPResponse::failure(
                    req.id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", req.method),
                )
            }
        }
    }

    /// Any requested protocol version is accepted; ours is always advertised.
    fn handle_initialize(&self, id: Option<Value>) -> MCPResponse {
        MCPResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": self.info.name,
                    "version": self.info.version
                },
                "capabilities": {
                    "tools": {}
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> MCPResponse {
        MCPResponse::success(id, json!({ "tools": self.registry.list() }))
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> MCPResponse {
        let Some(params) = params.filter(Value::is_object) else {
            return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params");
        };

        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params: missing tool name");
        };

        // Absent or null arguments mean "no arguments".
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        match self.registry.call(tool_name, arguments).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => MCPResponse::success(id, value),
                Err(e) => MCPResponse::failure(id, INTERNAL_ERROR, e.to_string()),
            },
            Err(CallError::UnknownTool(name)) => {
                MCPResponse::failure(id, METHOD_NOT_FOUND, format!("Unknown tool: {}", name))
            }
            Err(CallError::Tool(e)) => MCPResponse::failure(id, INTERNAL_ERROR, e.to_string()),
        }
    }
}
