//! Demo MCP servers used by the integration tests and the examples in the
//! top-level README: a temperature conversion service over HTTP and a
//! workspace-scoped terminal service over stdio.
//!
//! Both are thin front ends over [`McpService`], which owns the tool set and
//! the JSON-RPC handling.

/// Axum front end.
pub mod http;
/// Server-side JSON-RPC handling and the tool trait.
pub mod service;
/// Stdio front end.
pub mod stdio;
/// Temperature conversion tools.
pub mod temperature;
/// Workspace shell and file tools.
pub mod terminal;

pub use service::{McpService, ToolError, ToolHandler};
pub use temperature::temperature_service;
pub use terminal::terminal_service;
