//! Orchestration loop tests with scripted planners and an echo server.

use async_trait::async_trait;
use conduit_agent::{CancelToken, Orchestrator, PlanContext, Planner, PlannerAction};
use conduit_core::{
    ConduitError, ConduitResult, InvocationOutcome, ServerDescriptor, ToolErrorKind,
};
use conduit_mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use conduit_mcp::{Dispatcher, Registry, SessionState, Transport};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

// ---------------------------------------------------------------------------
// Echo server behind the transport seam
// ---------------------------------------------------------------------------

/// Speaks the handshake and answers `echo` calls with their own arguments.
struct EchoTransport {
    inbox_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<JsonRpcResponse>>>,
    inbox: Mutex<mpsc::UnboundedReceiver<JsonRpcResponse>>,
}

impl EchoTransport {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inbox_tx: std::sync::Mutex::new(Some(tx)),
            inbox: Mutex::new(rx),
        }
    }

    fn queue(&self, resp: JsonRpcResponse) {
        if let Some(tx) = self.inbox_tx.lock().unwrap().as_ref() {
            let _ = tx.send(resp);
        }
    }
}

#[async_trait]
impl Transport for EchoTransport {
    async fn send(&self, message: &JsonRpcRequest) -> ConduitResult<()> {
        match message.method.as_str() {
            "initialize" => self.queue(JsonRpcResponse::success(
                message.id,
                serde_json::json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "echo", "version": "0.0.0"},
                }),
            )),
            "notifications/initialized" => {}
            "tools/list" => self.queue(JsonRpcResponse::success(
                message.id,
                serde_json::json!({
                    "tools": [{"name": "echo", "inputSchema": {"type": "object"}}],
                }),
            )),
            "tools/call" => {
                let arguments = message
                    .params
                    .as_ref()
                    .and_then(|p| p.get("arguments"))
                    .cloned()
                    .unwrap_or(serde_json::json!({}));
                self.queue(JsonRpcResponse::success(
                    message.id,
                    serde_json::json!({
                        "content": [{"type": "text", "text": arguments.to_string()}],
                        "isError": false,
                    }),
                ));
            }
            other => panic!("unexpected method: {other}"),
        }
        Ok(())
    }

    async fn receive(&self) -> ConduitResult<JsonRpcResponse> {
        self.inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ConduitError::TransportClosed {
                server: "echo".to_string(),
            })
    }

    async fn close(&self) -> ConduitResult<()> {
        self.inbox_tx.lock().unwrap().take();
        Ok(())
    }
}

async fn echo_runtime() -> (Arc<Registry>, Dispatcher) {
    let registry = Arc::new(Registry::default());
    registry
        .load(vec![ServerDescriptor::stdio("echo", "unused", vec![])])
        .await
        .unwrap();
    let session = registry.session("echo").await.unwrap();
    session
        .start_with(Arc::new(EchoTransport::new()))
        .await
        .unwrap();
    let dispatcher = Dispatcher::new(registry.clone());
    (registry, dispatcher)
}

// ---------------------------------------------------------------------------
// Scripted planners
// ---------------------------------------------------------------------------

/// Finishes immediately without touching any tool.
struct FinishPlanner;

#[async_trait]
impl Planner for FinishPlanner {
    async fn decide(&self, _context: PlanContext<'_>) -> ConduitResult<PlannerAction> {
        Ok(PlannerAction::Finish {
            answer: "done".to_string(),
        })
    }
}

/// Calls `tool` once, then answers with what came back.
struct OneCallPlanner {
    tool: String,
}

#[async_trait]
impl Planner for OneCallPlanner {
    async fn decide(&self, context: PlanContext<'_>) -> ConduitResult<PlannerAction> {
        match context.history.first() {
            None => Ok(PlannerAction::CallTool {
                tool: self.tool.clone(),
                arguments: serde_json::json!({"msg": "hello"}),
            }),
            Some(step) => {
                let answer = match &step.result.outcome {
                    InvocationOutcome::Success(payload) => payload.to_string(),
                    InvocationOutcome::Failure(err) => format!("failed: {:?}", err.kind),
                };
                Ok(PlannerAction::Finish { answer })
            }
        }
    }
}

/// Never finishes; counts how many calls it requests.
struct GreedyPlanner {
    requested: AtomicU32,
}

#[async_trait]
impl Planner for GreedyPlanner {
    async fn decide(&self, _context: PlanContext<'_>) -> ConduitResult<PlannerAction> {
        self.requested.fetch_add(1, Ordering::SeqCst);
        Ok(PlannerAction::CallTool {
            tool: "echo".to_string(),
            arguments: serde_json::json!({}),
        })
    }
}

/// Lets one call through, then cancels the run mid-decision.
struct CancellingPlanner {
    token: CancelToken,
}

#[async_trait]
impl Planner for CancellingPlanner {
    async fn decide(&self, context: PlanContext<'_>) -> ConduitResult<PlannerAction> {
        if !context.history.is_empty() {
            self.token.cancel();
        }
        Ok(PlannerAction::CallTool {
            tool: "echo".to_string(),
            arguments: serde_json::json!({}),
        })
    }
}

// ---------------------------------------------------------------------------
// Loop behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_immediate_answer_makes_no_calls() {
    let (_registry, dispatcher) = echo_runtime().await;
    let orchestrator = Orchestrator::new(dispatcher, Arc::new(FinishPlanner), 5);

    let report = orchestrator.run("say done", &CancelToken::new()).await.unwrap();
    assert_eq!(report.answer, "done");
    assert_eq!(report.steps, 0);
    assert!(report.history.is_empty());
    assert!(report.trace.is_empty());
}

#[tokio::test]
async fn test_tool_result_feeds_next_decision() {
    let (_registry, dispatcher) = echo_runtime().await;
    let planner = OneCallPlanner {
        tool: "echo".to_string(),
    };
    let orchestrator = Orchestrator::new(dispatcher, Arc::new(planner), 5);

    let report = orchestrator.run("echo hello", &CancelToken::new()).await.unwrap();
    assert_eq!(report.steps, 1);
    assert!(report.answer.contains("hello"));
    assert_eq!(report.history.len(), 1);
    // One request and one response entry for the single call.
    assert_eq!(report.trace.len(), 2);
}

#[tokio::test]
async fn test_failed_call_is_data_not_abort() {
    let (_registry, dispatcher) = echo_runtime().await;
    let planner = OneCallPlanner {
        tool: "no_such_tool".to_string(),
    };
    let orchestrator = Orchestrator::new(dispatcher, Arc::new(planner), 5);

    let report = orchestrator.run("try a bad tool", &CancelToken::new()).await.unwrap();
    assert_eq!(report.steps, 1);
    assert!(report.answer.contains("UnknownTool"));
    match &report.history[0].result.outcome {
        InvocationOutcome::Failure(err) => assert_eq!(err.kind, ToolErrorKind::UnknownTool),
        InvocationOutcome::Success(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_step_limit_issues_exactly_max_steps_calls() {
    let (_registry, dispatcher) = echo_runtime().await;
    let planner = Arc::new(GreedyPlanner {
        requested: AtomicU32::new(0),
    });
    let orchestrator = Orchestrator::new(dispatcher, planner.clone(), 3);

    let err = orchestrator.run("never finish", &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err.error, ConduitError::StepLimitExceeded { max_steps: 3 }));
    assert_eq!(err.steps, 3);
    // Each dispatched call leaves a request and a response entry.
    assert_eq!(err.trace.len(), 6);
}

#[tokio::test]
async fn test_cancellation_keeps_sessions_open() {
    let (registry, dispatcher) = echo_runtime().await;
    let token = CancelToken::new();
    let planner = CancellingPlanner {
        token: token.clone(),
    };
    let orchestrator = Orchestrator::new(dispatcher, Arc::new(planner), 5);

    let err = orchestrator.run("cancel me", &token).await.unwrap_err();
    assert!(matches!(err.error, ConduitError::Cancelled));
    assert_eq!(err.steps, 1);
    // The call issued before cancellation is in the partial trace.
    assert_eq!(err.trace.len(), 2);

    let session = registry.session("echo").await.unwrap();
    assert_eq!(session.state().await, SessionState::Ready);
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let (_registry, dispatcher) = echo_runtime().await;
    let token = CancelToken::new();
    token.cancel();
    let orchestrator = Orchestrator::new(dispatcher, Arc::new(FinishPlanner), 5);

    let err = orchestrator.run("too late", &token).await.unwrap_err();
    assert!(matches!(err.error, ConduitError::Cancelled));
    assert_eq!(err.steps, 0);
    assert!(err.trace.is_empty());
}
