//! MCP client runtime: transports, sessions, registry, and dispatcher.
//!
//! This crate speaks the Model Context Protocol from the client side. It
//! connects to servers over streamable HTTP or subprocess stdio, runs the
//! initialize handshake, discovers tools, and routes tool calls by name
//! through a flat merged namespace.
//!
//! # Main types
//!
//! - [`Transport`] — One open channel to a server; two implementations.
//! - [`Session`] — Handshake, correlation, timeouts, and lifecycle state.
//! - [`Registry`] — Owns all sessions and the merged tool catalog.
//! - [`Dispatcher`] — Routes calls and normalizes failures into data.

/// Tool call routing and error normalization.
pub mod dispatcher;
/// JSON-RPC message types for the protocol.
pub mod protocol;
/// Session registry and merged tool catalog.
pub mod registry;
/// Per-server protocol sessions.
pub mod session;
/// Transport trait and the stdio and HTTP implementations.
pub mod transport;

pub use dispatcher::Dispatcher;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
pub use registry::{merge_catalogs, Registry, StartReport};
pub use session::{Session, SessionConfig, SessionState};
pub use transport::{HttpTransport, StdioTransport, Transport};
