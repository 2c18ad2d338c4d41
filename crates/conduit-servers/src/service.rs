//! Server-side JSON-RPC handling shared by both demo servers.
//!
//! An [`McpService`] owns a set of [`ToolHandler`]s and answers the three
//! client-facing methods: `initialize`, `tools/list`, and `tools/call`.
//! Transport loops (stdio lines, HTTP bodies) hand it one decoded message at
//! a time and write back whatever it returns.

use async_trait::async_trait;
use conduit_mcp::protocol::{JsonRpcResponse, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// JSON-RPC error code for malformed JSON.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code for invalid parameters.
pub const INVALID_PARAMS: i64 = -32602;

/// Why a tool handler rejected a call.
#[derive(Debug)]
pub enum ToolError {
    /// The arguments do not match the tool's schema. Becomes a JSON-RPC
    /// `-32602` error.
    InvalidParams(String),
    /// The tool ran and failed. Becomes an `isError` tool result.
    Failed(String),
}

impl ToolError {
    /// Invalid-params rejection.
    pub fn invalid(msg: impl Into<String>) -> Self {
        ToolError::InvalidParams(msg.into())
    }

    /// Execution failure.
    pub fn failed(msg: impl Into<String>) -> Self {
        ToolError::Failed(msg.into())
    }
}

/// One tool exposed by a service.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The tool's name.
    fn name(&self) -> &str;

    /// One-line description for the catalog.
    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn input_schema(&self) -> Value;

    /// Execute the tool.
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// A named set of tools behind the standard protocol methods.
pub struct McpService {
    name: String,
    version: String,
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl McpService {
    /// A service advertising itself as `name`/`version`.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: Vec::new(),
        }
    }

    /// Add one tool.
    pub fn with_tool(mut self, tool: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Handle one decoded message. Returns `None` for notifications, which
    /// receive no response.
    pub async fn handle(&self, message: Value) -> Option<JsonRpcResponse> {
        let id = message.get("id").and_then(Value::as_u64);
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        debug!(method = %method, id = ?id, "request");

        match method {
            "initialize" => Some(JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": self.name, "version": self.version},
                }),
            )),
            "notifications/initialized" => None,
            "tools/list" => {
                let tools: Vec<Value> = self
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name(),
                            "description": t.description(),
                            "inputSchema": t.input_schema(),
                        })
                    })
                    .collect();
                Some(JsonRpcResponse::success(id, json!({"tools": tools})))
            }
            "tools/call" => Some(self.call_tool(id, message.get("params")).await),
            other => {
                // Unknown notifications are dropped; unknown requests get an
                // error back.
                id?;
                warn!(method = %other, "method not found");
                Some(JsonRpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                ))
            }
        }
    }

    async fn call_tool(&self, id: Option<u64>, params: Option<&Value>) -> JsonRpcResponse {
        let Some(tool_name) = params
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
        else {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing tool name");
        };
        let arguments = params
            .and_then(|p| p.get("arguments"))
            .cloned()
            .unwrap_or(json!({}));

        let Some(tool) = self.tools.iter().find(|t| t.name() == tool_name) else {
            return JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("Unknown tool: {tool_name}"),
            );
        };

        match tool.call(arguments).await {
            Ok(payload) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{"type": "text", "text": payload.to_string()}],
                    "isError": false,
                }),
            ),
            Err(ToolError::InvalidParams(msg)) => {
                JsonRpcResponse::failure(id, INVALID_PARAMS, msg)
            }
            Err(ToolError::Failed(msg)) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{"type": "text", "text": msg}],
                    "isError": true,
                }),
            ),
        }
    }
}

/// Pull a required numeric argument out of `arguments`.
pub fn require_f64(arguments: &Value, key: &str) -> Result<f64, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::invalid(format!("'{key}' must be a number")))
}

/// Pull a required string argument out of `arguments`.
pub fn require_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid(format!("'{key}' must be a string")))
}
