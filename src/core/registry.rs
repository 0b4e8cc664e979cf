/// Tool Registry
///
/// Maps tool names to their descriptor and async handler. The registry is
/// filled through `&mut` during start-up, then frozen in an `Arc` and shared
/// read-only by the dispatcher and the REST facade.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::core::error::{CallError, ToolError};
use crate::core::protocol::{MCPTool, ToolResult};

/// Tool handler function type.
///
/// Handlers receive the `arguments` object of a `tools/call` and resolve to a
/// `ToolResult`, or to a `ToolError` when the call could not be served at all.
pub type ToolHandler =
    Box<dyn Fn(Value) -> BoxFuture<'static, Result<ToolResult, ToolError>> + Send + Sync>;

#[derive(Default)]
pub struct ToolRegistry {
    /// Descriptors in registration order (for tools/list)
    tools: Vec<MCPTool>,
    /// Handlers keyed by exact tool name (for tools/call)
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A second registration under the same name replaces
    /// the first but keeps its position in the listing.
    pub fn register(&mut self, tool: MCPTool, handler: ToolHandler) {
        let name = tool.name.clone();
        match self.tools.iter_mut().find(|t| t.name == name) {
            Some(existing) => {
                tracing::warn!(tool = %name, "tool registered twice, replacing");
                *existing = tool;
            }
            None => self.tools.push(tool),
        }
        self.handlers.insert(name, handler);
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> &[MCPTool] {
        &self.tools
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, name: &str) -> Option<&ToolHandler> {
        self.handlers.get(name)
    }

    /// Run the named tool. Panics inside the handler are caught and reported
    /// as `ToolError::Internal`.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolResult, CallError> {
        let handler = self
            .resolve(name)
            .ok_or_else(|| CallError::UnknownTool(name.to_string()))?;

        let started = std::time::Instant::now();
        let outcome = match AssertUnwindSafe(handler(arguments)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(ToolError::Internal(panic_message(panic.as_ref()))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(result) => tracing::info!(
                tool = name,
                elapsed_ms,
                is_error = result.is_error(),
                "tool call finished"
            ),
            Err(e) => tracing::warn!(tool = name, elapsed_ms, error = %e, "tool call failed"),
        }
        Ok(outcome?)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("tool panicked: {}", s)
    } else {
        "tool panicked".to_string()
    }
}
