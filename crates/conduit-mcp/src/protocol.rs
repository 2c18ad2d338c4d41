//! JSON-RPC 2.0 message types for the Model Context Protocol.
//!
//! Both transports carry the same framing: one JSON-RPC message per frame
//! (one line over stdio, one HTTP body or SSE event over HTTP).

use serde::{Deserialize, Serialize};

/// Protocol revision sent during the initialize handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request. A request without an id is a notification and
/// receives no response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Correlation id; `None` for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Method name (e.g. `tools/call`).
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// A request expecting a correlated response.
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// A fire-and-forget notification.
    pub fn notification(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Correlation id of the request this answers; `None` for
    /// server-initiated notifications.
    pub id: Option<u64>,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error object on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A successful response for `id`.
    pub fn success(id: Option<u64>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// An error response for `id`.
    pub fn failure(id: Option<u64>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Standard JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Tool definition from a `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolDef {
    /// Tool name as declared by the server.
    pub name: String,
    /// Tool description.
    #[serde(default)]
    pub description: String,
    /// JSON schema for the tool's arguments.
    #[serde(default = "default_input_schema", rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Tool call result from a `tools/call` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolResult {
    /// Content blocks produced by the tool.
    #[serde(default)]
    pub content: Vec<WireContent>,
    /// Whether the handler reported an error.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl WireToolResult {
    /// Collapse the content blocks into a single payload: a lone block that
    /// parses as JSON becomes that value, otherwise the texts are joined
    /// into one string.
    pub fn into_payload(self) -> serde_json::Value {
        let texts: Vec<String> = self.content.into_iter().map(|c| c.text).collect();
        if texts.len() == 1 {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&texts[0]) {
                return value;
            }
        }
        serde_json::Value::String(texts.join("\n"))
    }
}

/// One content block within a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireContent {
    /// Block type; only `text` blocks are interpreted.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content of the block.
    #[serde(default)]
    pub text: String,
}

impl WireContent {
    /// A text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Capability flags from an `initialize` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool capability block, present when the server exposes tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
}

/// `initialize` response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol revision the server speaks.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Advertised capabilities.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server identity.
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<PeerInfo>,
}

/// Identity block inside an `initialize` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Server-reported name.
    pub name: String,
    /// Server-reported version.
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(3, "tools/call", Some(serde_json::json!({"name": "c2f"})));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 3);
        assert_eq!(json["method"], "tools/call");
        assert_eq!(json["params"]["name"], "c2f");
    }

    #[test]
    fn test_notification_omits_id() {
        let req = JsonRpcRequest::notification("notifications/initialized", None);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("params").is_none());
    }

    #[test]
    fn test_response_parse() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":9,"result":{"tools":[]}}"#).unwrap();
        assert_eq!(resp.id, Some(9));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_error_response_parse() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "Method not found");
    }

    #[test]
    fn test_tool_def_schema_default() {
        let def: WireToolDef = serde_json::from_str(r#"{"name":"run_command"}"#).unwrap();
        assert_eq!(def.input_schema["type"], "object");
        assert!(def.description.is_empty());
    }

    #[test]
    fn test_tool_result_payload_json() {
        let result: WireToolResult = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"value\": 32.0}"}],"isError":false}"#,
        )
        .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.into_payload()["value"], 32.0);
    }

    #[test]
    fn test_tool_result_payload_plain_text() {
        let result = WireToolResult {
            content: vec![WireContent::text("line one"), WireContent::text("line two")],
            is_error: false,
        };
        assert_eq!(
            result.into_payload(),
            serde_json::Value::String("line one\nline two".to_string())
        );
    }

    #[test]
    fn test_initialize_result_parse() {
        let init: InitializeResult = serde_json::from_str(
            r#"{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"temperature_converter","version":"0.3.0"}}"#,
        )
        .unwrap();
        assert_eq!(init.protocol_version, PROTOCOL_VERSION);
        assert!(init.capabilities.tools.is_some());
        assert_eq!(init.server_info.unwrap().name, "temperature_converter");
    }
}
