//! Normalized tool invocation results.
//!
//! The dispatcher is the error-normalization boundary: whatever goes wrong
//! below it (transport, session state, timeouts) is folded into a
//! [`ToolCallError`] and returned as data, so the planner can make an
//! informed next decision instead of seeing transport internals.

use crate::ConduitError;
use serde::{Deserialize, Serialize};

/// Broad classification of a failed tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No session owns the requested tool.
    UnknownTool,
    /// The per-request timeout elapsed.
    Timeout,
    /// The owning session was closed while the request was in flight.
    SessionClosed,
    /// The owning session was not in the `Ready` state.
    InvalidState,
    /// A transport-level failure (broken pipe, disconnect, spawn failure).
    Transport,
    /// The tool handler itself reported an error.
    Handler,
}

impl ToolErrorKind {
    /// Classify a runtime error for normalization.
    pub fn of(err: &ConduitError) -> Self {
        match err {
            ConduitError::UnknownTool(_) => ToolErrorKind::UnknownTool,
            ConduitError::Timeout { .. } => ToolErrorKind::Timeout,
            ConduitError::SessionClosed { .. } => ToolErrorKind::SessionClosed,
            ConduitError::InvalidState { .. } => ToolErrorKind::InvalidState,
            ConduitError::Connection { .. }
            | ConduitError::Transport { .. }
            | ConduitError::TransportClosed { .. }
            | ConduitError::Handshake { .. } => ToolErrorKind::Transport,
            _ => ToolErrorKind::Handler,
        }
    }
}

/// Uniform error surfaced by the dispatcher for a failed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallError {
    /// Broad failure classification.
    pub kind: ToolErrorKind,
    /// The tool that was being invoked.
    pub tool: String,
    /// Human-readable detail.
    pub detail: String,
}

impl ToolCallError {
    /// Wrap a runtime error for the given tool.
    pub fn wrap(tool: impl Into<String>, err: &ConduitError) -> Self {
        Self {
            kind: ToolErrorKind::of(err),
            tool: tool.into(),
            detail: err.to_string(),
        }
    }

    /// An error reported by the tool handler itself.
    pub fn handler(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::Handler,
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tool '{}' failed ({:?}): {}", self.tool, self.kind, self.detail)
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// The tool completed and produced a payload.
    Success(serde_json::Value),
    /// The call failed; the error is data, never silently dropped.
    Failure(ToolCallError),
}

/// The matched response to exactly one invocation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Correlation id linking this result to its request. Zero when the
    /// request never reached a session (e.g. unknown tool).
    pub correlation_id: u64,
    /// Success payload or normalized failure.
    pub outcome: InvocationOutcome,
}

impl InvocationResult {
    /// A successful result.
    pub fn success(correlation_id: u64, payload: serde_json::Value) -> Self {
        Self {
            correlation_id,
            outcome: InvocationOutcome::Success(payload),
        }
    }

    /// A failed result.
    pub fn failure(correlation_id: u64, error: ToolCallError) -> Self {
        Self {
            correlation_id,
            outcome: InvocationOutcome::Failure(error),
        }
    }

    /// Whether the outcome is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, InvocationOutcome::Failure(_))
    }
}
