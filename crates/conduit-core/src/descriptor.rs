//! Server and tool descriptors.
//!
//! A [`ServerDescriptor`] is the validated, immutable configuration for one
//! MCP server; [`ToolDescriptor`]s are produced during capability discovery
//! and live as long as the session that owns them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to reach a server: over streamable HTTP or by spawning a subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP/streamable transport: JSON-RPC messages POSTed to `url`.
    Http {
        /// Endpoint accepting framed JSON-RPC messages.
        url: String,
    },
    /// Subprocess stdio transport: line-delimited JSON-RPC over the child's
    /// standard streams.
    Stdio {
        /// Command to spawn.
        command: String,
        /// Arguments passed to the command.
        #[serde(default)]
        args: Vec<String>,
        /// Extra environment variables for the child process.
        #[serde(default)]
        env: HashMap<String, String>,
    },
}

impl TransportKind {
    /// Short label for logs and status output.
    pub fn label(&self) -> &'static str {
        match self {
            TransportKind::Http { .. } => "http",
            TransportKind::Stdio { .. } => "stdio",
        }
    }
}

/// Configuration for one MCP server. Immutable once loaded; the source of
/// truth for session construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Unique server name; the key for routing and reporting.
    pub name: String,
    /// Transport kind and connection parameters.
    #[serde(flatten)]
    pub transport: TransportKind,
    /// Human-readable description from the configuration.
    #[serde(default)]
    pub description: String,
}

impl ServerDescriptor {
    /// Descriptor for an HTTP server.
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::Http { url: url.into() },
            description: String::new(),
        }
    }

    /// Descriptor for a stdio server spawned from `command`.
    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            transport: TransportKind::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
            },
            description: String::new(),
        }
    }
}

/// One tool discovered on a server. Read-only after discovery; destroyed
/// when its owning session closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name; globally unique after the registry merge.
    pub name: String,
    /// Description advertised by the server.
    #[serde(default)]
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub input_schema: serde_json::Value,
    /// Name of the server that owns this tool.
    pub server: String,
}
