//! Full client flow over the HTTP transport against a mock server.

use conduit_core::{InvocationOutcome, ServerDescriptor, TraceRecorder};
use conduit_mcp::{Dispatcher, Registry, SessionState};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers JSON-RPC over POST, echoing each request's correlation id.
struct McpResponder;

impl Respond for McpResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request body is JSON");
        let id = body.get("id").cloned().unwrap_or(serde_json::Value::Null);

        let result = match body["method"].as_str().unwrap_or("") {
            "initialize" => serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "temperature_converter", "version": "0.3.0"},
            }),
            "notifications/initialized" => return ResponseTemplate::new(202),
            "tools/list" => serde_json::json!({
                "tools": [{
                    "name": "celsius_to_fahrenheit",
                    "description": "Convert Celsius to Fahrenheit",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"celsius": {"type": "number"}},
                        "required": ["celsius"],
                    },
                }],
            }),
            "tools/call" => {
                let celsius = body["params"]["arguments"]["celsius"]
                    .as_f64()
                    .expect("celsius argument");
                let fahrenheit = celsius * 9.0 / 5.0 + 32.0;
                let payload = serde_json::json!({"value": fahrenheit}).to_string();
                serde_json::json!({
                    "content": [{"type": "text", "text": payload}],
                    "isError": false,
                })
            }
            other => panic!("unexpected method: {other}"),
        };

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
    }
}

async fn mock_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(McpResponder)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_http_session_handshake_and_catalog() {
    let server = mock_server().await;
    let registry = Registry::default();
    registry
        .load(vec![ServerDescriptor::http(
            "temp",
            format!("{}/mcp", server.uri()),
        )])
        .await
        .unwrap();

    let report = registry.start_all().await;
    assert!(report.all_started(), "failed: {:?}", report.failed);

    let catalog = registry.tool_catalog().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].name, "celsius_to_fahrenheit");
    assert_eq!(catalog[0].server, "temp");

    registry.stop_all().await;
    let statuses = registry.statuses().await;
    assert_eq!(statuses[0].1, SessionState::Closed);
}

#[tokio::test]
async fn test_http_dispatch_converts_and_traces() {
    let server = mock_server().await;
    let registry = Arc::new(Registry::default());
    registry
        .load(vec![ServerDescriptor::http(
            "temp",
            format!("{}/mcp", server.uri()),
        )])
        .await
        .unwrap();
    assert!(registry.start_all().await.all_started());

    let dispatcher = Dispatcher::new(registry.clone());
    let trace = TraceRecorder::new();
    let result = dispatcher
        .call(
            &trace,
            "celsius_to_fahrenheit",
            serde_json::json!({"celsius": 0.0}),
        )
        .await;

    assert!(result.correlation_id > 0);
    match result.outcome {
        InvocationOutcome::Success(payload) => assert_eq!(payload["value"], 32.0),
        InvocationOutcome::Failure(err) => panic!("call failed: {err}"),
    }

    let entries = trace.snapshot().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].server.as_deref(), Some("temp"));
    assert_eq!(entries[1].server.as_deref(), Some("temp"));

    registry.stop_all().await;
}
