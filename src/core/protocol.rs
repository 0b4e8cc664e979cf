/// MCP Wire Types
///
/// JSON-RPC 2.0 request/response envelopes and the MCP tool-result payload.
/// These shapes are fixed by the protocol; field names are serialized exactly
/// as MCP clients expect them (`inputSchema`, `isError`, `protocolVersion`).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision advertised by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is None for notifications, which expect no reply.
#[derive(Deserialize, Debug, Clone)]
pub struct MCPRequest {
    /// JSON-RPC version identifier. Not enforced: some clients omit it.
    #[allow(dead_code)]
    #[serde(default)]
    pub jsonrpc: String,
    /// Request ID for correlating responses. None indicates a notification.
    #[serde(default)]
    pub id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    pub method: String,
    /// Method-specific parameters
    #[serde(default)]
    pub params: Option<Value>,
}

impl MCPRequest {
    /// Decode one message from raw bytes.
    ///
    /// On failure the error is the response to send back: `-32700` when the
    /// bytes are not JSON, `-32600` (with the id, if one was readable) when the
    /// JSON is not a request object.
    pub fn decode(raw: &[u8]) -> Result<Self, MCPResponse> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| {
            MCPResponse::failure(None, PARSE_ERROR, format!("Parse error: {}", e))
        })?;
        let id = value.get("id").filter(|id| !id.is_null()).cloned();
        serde_json::from_value(value).map_err(|e| {
            MCPResponse::failure(id, INVALID_REQUEST, format!("Invalid request: {}", e))
        })
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response structure.
///
/// Built only through `success` and `failure`, so exactly one of `result` and
/// `error` is ever present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MCPResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MCPError {
    pub code: i32,
    pub message: String,
}

impl MCPResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
            }),
        }
    }

    /// Encode as a single SSE `data:` frame.
    pub fn to_sse_frame(&self) -> Bytes {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            // Only reachable if a tool produced a non-string map key.
            tracing::error!(error = %e, "failed to serialize response");
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"response serialization failed"}}}}"#,
                INTERNAL_ERROR
            )
        });
        Bytes::from(format!("data: {}\n\n", json))
    }
}

/// MCP tool definition as listed by `tools/list`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MCPTool {
    /// Unique tool identifier (e.g., "get_stock")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema of the `arguments` object
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// One block of tool output. Only text blocks are produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Payload of a successful `tools/call`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// A result the client should treat as a failed call, e.g. bad arguments.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// All text blocks joined by blank lines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_omits_result() {
        let response = MCPResponse::failure(Some(json!(7)), METHOD_NOT_FOUND, "nope");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "error": {"code": -32601, "message": "nope"}})
        );
    }

    #[test]
    fn missing_id_serializes_as_null() {
        let response = MCPResponse::success(None, json!({}));
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("id").unwrap().is_null());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn sse_frame_is_single_data_line() {
        let frame = MCPResponse::success(Some(json!("a")), json!({"ok": true})).to_sse_frame();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("}\n\n"));
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn tool_result_wire_shape() {
        assert_eq!(
            serde_json::to_value(ToolResult::text("hi")).unwrap(),
            json!({"content": [{"type": "text", "text": "hi"}]})
        );
        assert_eq!(
            serde_json::to_value(ToolResult::error("bad")).unwrap(),
            json!({"content": [{"type": "text", "text": "bad"}], "isError": true})
        );
    }

    #[test]
    fn request_tolerates_missing_jsonrpc_and_params() {
        let req: MCPRequest = serde_json::from_str(r#"{"id":1,"method":"tools/list"}"#).unwrap();
        assert_eq!(req.method, "tools/list");
        assert!(req.params.is_none());
        assert!(!req.is_notification());

        let note: MCPRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(note.is_notification());
    }

    #[test]
    fn decode_distinguishes_parse_and_shape_errors() {
        let parse = MCPRequest::decode(b"{not json").unwrap_err();
        assert_eq!(parse.error.unwrap().code, PARSE_ERROR);
        assert!(parse.id.is_none());

        let shape = MCPRequest::decode(br#"{"jsonrpc":"2.0","id":"abc"}"#).unwrap_err();
        assert_eq!(shape.id, Some(json!("abc")));
        assert_eq!(shape.error.unwrap().code, INVALID_REQUEST);

        let array = MCPRequest::decode(b"[1,2]").unwrap_err();
        assert_eq!(array.error.unwrap().code, INVALID_REQUEST);
    }
}
