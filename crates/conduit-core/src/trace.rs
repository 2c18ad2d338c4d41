//! Per-run protocol trace.
//!
//! One [`TraceRecorder`] instance exists per orchestration run and is passed
//! explicitly rather than held in a global, so concurrent runs never
//! cross-contaminate their traces. Recording never affects control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Which way a traced payload travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceDirection {
    /// Outbound tool invocation request.
    Request,
    /// Inbound successful response.
    Response,
    /// Inbound or synthesized error.
    Error,
}

/// One entry in the append-only trace sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Request, response, or error.
    pub direction: TraceDirection,
    /// Owning server, when the payload could be routed to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Snapshot of the payload at this hop.
    pub payload: serde_json::Value,
}

/// Append-only recorder for one run's protocol-level events.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    entries: RwLock<Vec<TraceEntry>>,
}

impl TraceRecorder {
    /// A fresh, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub async fn record(
        &self,
        direction: TraceDirection,
        server: Option<String>,
        payload: serde_json::Value,
    ) {
        let entry = TraceEntry {
            timestamp: Utc::now(),
            direction,
            server,
            payload,
        };
        self.entries.write().await.push(entry);
    }

    /// Append an outbound request entry.
    pub async fn request(&self, server: Option<String>, payload: serde_json::Value) {
        self.record(TraceDirection::Request, server, payload).await;
    }

    /// Append an inbound response entry.
    pub async fn response(&self, server: Option<String>, payload: serde_json::Value) {
        self.record(TraceDirection::Response, server, payload).await;
    }

    /// Append an error entry.
    pub async fn error(&self, server: Option<String>, payload: serde_json::Value) {
        self.record(TraceDirection::Error, server, payload).await;
    }

    /// Read-only snapshot of the current sequence, in recording order.
    pub async fn snapshot(&self) -> Vec<TraceEntry> {
        self.entries.read().await.clone()
    }

    /// Number of recorded entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has been recorded yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Discard all entries. Called at the start of a new run when a recorder
    /// is reused.
    pub async fn reset(&self) {
        self.entries.write().await.clear();
    }
}
