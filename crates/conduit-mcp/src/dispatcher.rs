//! Tool call routing and error normalization.
//!
//! The dispatcher resolves a tool name to its owning session, forwards the
//! call, and folds every failure mode into a [`ToolCallError`] carried as
//! data. Callers above this layer never see a transport-level `Err` from a
//! tool call; an unknown tool is answered without contacting any session.

use crate::registry::Registry;
use conduit_core::{InvocationOutcome, InvocationResult, ToolCallError, TraceRecorder};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes tool calls to sessions through the registry's merged namespace.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    /// A dispatcher over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher routes through.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Invoke `tool` with `arguments`, recording the request and its outcome
    /// on `trace`. Always returns a result; failures are data.
    pub async fn call(
        &self,
        trace: &TraceRecorder,
        tool: &str,
        arguments: serde_json::Value,
    ) -> InvocationResult {
        let session = match self.registry.session_for(tool).await {
            Ok(session) => session,
            Err(e) => {
                // No session was contacted; the request is traced without an
                // owning server.
                trace
                    .request(None, serde_json::json!({"tool": tool, "arguments": arguments}))
                    .await;
                let error = ToolCallError::wrap(tool, &e);
                warn!(tool = %tool, error = %e, "tool call rejected before dispatch");
                trace
                    .error(None, serde_json::to_value(&error).unwrap_or_default())
                    .await;
                return InvocationResult::failure(0, error);
            }
        };

        let server = session.name().to_string();
        trace
            .request(
                Some(server.clone()),
                serde_json::json!({"tool": tool, "arguments": arguments}),
            )
            .await;

        let result = match session.invoke(tool, arguments).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %tool, server = %server, error = %e, "tool call failed");
                InvocationResult::failure(0, ToolCallError::wrap(tool, &e))
            }
        };

        match &result.outcome {
            InvocationOutcome::Success(payload) => {
                debug!(tool = %tool, server = %server, id = result.correlation_id, "tool call succeeded");
                trace.response(Some(server), payload.clone()).await;
            }
            InvocationOutcome::Failure(error) => {
                trace
                    .error(
                        Some(server),
                        serde_json::to_value(error).unwrap_or_default(),
                    )
                    .await;
            }
        }
        result
    }
}
