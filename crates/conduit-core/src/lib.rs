//! Core types and error definitions shared across the Conduit runtime.
//!
//! This crate provides the foundational types used by every other Conduit
//! crate: the unified error enum, server and tool descriptors, normalized
//! invocation results, and the per-run trace recorder.
//!
//! # Main types
//!
//! - [`ConduitError`] — Unified error enum for the whole runtime.
//! - [`ConduitResult`] — Convenience alias for `Result<T, ConduitError>`.
//! - [`ServerDescriptor`] / [`TransportKind`] — Validated server config.
//! - [`ToolDescriptor`] — One discovered tool, tagged with its owning server.
//! - [`InvocationResult`] — Outcome of a dispatched tool call.
//! - [`TraceRecorder`] — Append-only protocol trace for one run.

/// Server and tool descriptors.
pub mod descriptor;
/// Normalized tool invocation results.
pub mod invocation;
/// Per-run protocol trace.
pub mod trace;

pub use descriptor::{ServerDescriptor, ToolDescriptor, TransportKind};
pub use invocation::{InvocationResult, InvocationOutcome, ToolCallError, ToolErrorKind};
pub use trace::{TraceDirection, TraceEntry, TraceRecorder};

/// Top-level error type for the Conduit runtime.
///
/// Session-scoped variants (`Connection`, `Transport`, `TransportClosed`,
/// `Handshake`, `Timeout`, `SessionClosed`, `InvalidState`) are contained at
/// the session boundary and surface through the registry's start report or a
/// normalized [`ToolCallError`]. Only `Config` and `ToolNameCollision` are
/// fatal to the startup sequence.
#[derive(Debug, thiserror::Error)]
pub enum ConduitError {
    /// Bad or duplicate server definitions; fatal at load.
    #[error("Config error: {0}")]
    Config(String),

    /// The transport could not be opened (spawn failure, malformed endpoint).
    #[error("Connection error ({server}): {detail}")]
    Connection {
        /// Name of the server the connection was for.
        server: String,
        /// What went wrong.
        detail: String,
    },

    /// A send or receive on an open transport failed.
    #[error("Transport error ({server}): {detail}")]
    Transport {
        /// Name of the server behind the transport.
        server: String,
        /// What went wrong.
        detail: String,
    },

    /// The peer disconnected; fatal for the owning session only.
    #[error("Transport closed ({server})")]
    TransportClosed {
        /// Name of the server behind the transport.
        server: String,
    },

    /// Capability discovery failed or did not complete within its timeout.
    #[error("Handshake error ({server}): {detail}")]
    Handshake {
        /// Name of the server being initialized.
        server: String,
        /// What went wrong.
        detail: String,
    },

    /// A single request did not receive its response in time.
    #[error("Request to '{server}' timed out after {timeout_secs}s")]
    Timeout {
        /// Name of the server the request was sent to.
        server: String,
        /// The per-request timeout that elapsed.
        timeout_secs: u64,
    },

    /// Two servers declare the same tool name; fatal at merge time.
    #[error("Tool '{tool}' declared by both '{first}' and '{second}'")]
    ToolNameCollision {
        /// The colliding tool name.
        tool: String,
        /// First server declaring it.
        first: String,
        /// Second server declaring it.
        second: String,
    },

    /// No session owns the requested tool.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// An operation was attempted in a state that does not permit it.
    #[error("Invalid session state ({server}): {state}")]
    InvalidState {
        /// Name of the server the session belongs to.
        server: String,
        /// The state the session was in.
        state: String,
    },

    /// The session was stopped while requests were outstanding.
    #[error("Session closed ({server})")]
    SessionClosed {
        /// Name of the server the session belonged to.
        server: String,
    },

    /// The orchestrator loop exhausted its iteration budget.
    #[error("Step limit of {max_steps} exceeded without a final answer")]
    StepLimitExceeded {
        /// The bound that was hit.
        max_steps: u32,
    },

    /// The current run was cancelled by the caller.
    #[error("Run cancelled")]
    Cancelled,

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ConduitError`].
pub type ConduitResult<T> = Result<T, ConduitError>;
