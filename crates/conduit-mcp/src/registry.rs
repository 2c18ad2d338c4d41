//! Session registry and merged tool catalog.
//!
//! The registry owns one [`Session`] per configured server, drives their
//! lifecycles together, and merges their discovered tools into one flat
//! namespace. Tool names are not prefixed with their server name; a name
//! declared by two servers is a hard error that names both.

use crate::session::{Session, SessionConfig, SessionState};
use conduit_core::{ConduitError, ConduitResult, ServerDescriptor, ToolDescriptor};
use futures_util::future::join_all;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Outcome of [`Registry::start_all`]: which servers came up and which did
/// not. One server failing never aborts the others.
#[derive(Debug, Default)]
pub struct StartReport {
    /// Servers whose handshake completed.
    pub started: Vec<String>,
    /// Servers that failed to start, with the cause.
    pub failed: Vec<(String, ConduitError)>,
}

impl StartReport {
    /// Whether every configured server started.
    pub fn all_started(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owner of all sessions and the merged tool namespace.
#[derive(Default)]
pub struct Registry {
    config: SessionConfig,
    sessions: RwLock<Vec<Arc<Session>>>,
    /// Tool name to owning session, rebuilt on each successful catalog
    /// merge so steady-state routing is one map lookup.
    routes: RwLock<HashMap<String, Arc<Session>>>,
}

impl Registry {
    /// A registry whose sessions use `config` for their timeout policy.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(Vec::new()),
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Validate `descriptors` and build one session per entry, replacing any
    /// previously loaded set. Previously running sessions are stopped first.
    pub async fn load(&self, descriptors: Vec<ServerDescriptor>) -> ConduitResult<()> {
        let mut seen = HashSet::new();
        for d in &descriptors {
            if d.name.trim().is_empty() {
                return Err(ConduitError::Config(
                    "server name must not be empty".to_string(),
                ));
            }
            if !seen.insert(d.name.clone()) {
                return Err(ConduitError::Config(format!(
                    "duplicate server name '{}'",
                    d.name
                )));
            }
        }

        self.stop_all().await;

        let sessions = descriptors
            .into_iter()
            .map(|d| Arc::new(Session::new(d, self.config)))
            .collect();
        *self.sessions.write().await = sessions;
        Ok(())
    }

    /// Start every loaded session concurrently, continuing past individual
    /// failures.
    pub async fn start_all(&self) -> StartReport {
        let sessions = self.sessions.read().await.clone();
        let mut report = StartReport::default();

        let outcomes = join_all(sessions.iter().map(|session| async {
            (session.name().to_string(), session.start().await)
        }))
        .await;

        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.started.push(name),
                Err(e) => {
                    error!(server = %name, error = %e, "server failed to start");
                    report.failed.push((name, e));
                }
            }
        }

        // Prime the route table; a collision surfaces again on the next
        // explicit catalog request.
        if let Err(e) = self.tool_catalog().await {
            warn!(error = %e, "tool catalog unavailable after startup");
        }

        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "startup complete"
        );
        report
    }

    /// The merged catalog across all ready sessions. Rebuilds the route
    /// table as a side effect.
    ///
    /// Fails with [`ConduitError::ToolNameCollision`] if two servers declare
    /// the same tool name.
    pub async fn tool_catalog(&self) -> ConduitResult<Vec<ToolDescriptor>> {
        let sessions = self.sessions.read().await.clone();
        let mut catalogs = Vec::new();
        let mut owners: HashMap<String, Arc<Session>> = HashMap::new();
        for session in sessions {
            if session.is_ready().await {
                owners.insert(session.name().to_string(), session.clone());
                catalogs.push(session.tools().await);
            }
        }

        let merged = merge_catalogs(catalogs);
        let mut routes = self.routes.write().await;
        routes.clear();
        if let Ok(catalog) = &merged {
            for tool in catalog {
                if let Some(session) = owners.get(&tool.server) {
                    routes.insert(tool.name.clone(), session.clone());
                }
            }
        }
        merged
    }

    /// The session that owns `tool`, per the merged namespace. One map
    /// lookup on the route table, with a scan fallback for sessions that
    /// became ready since the last merge. A tool declared by two ready
    /// sessions is a collision, never a silent pick of one of them.
    pub async fn session_for(&self, tool: &str) -> ConduitResult<Arc<Session>> {
        if let Some(session) = self.routes.read().await.get(tool) {
            if session.is_ready().await {
                return Ok(session.clone());
            }
        }

        let sessions = self.sessions.read().await.clone();
        let mut owner: Option<Arc<Session>> = None;
        for session in sessions {
            if session.is_ready().await
                && session.tools().await.iter().any(|t| t.name == tool)
            {
                if let Some(first) = &owner {
                    return Err(ConduitError::ToolNameCollision {
                        tool: tool.to_string(),
                        first: first.name().to_string(),
                        second: session.name().to_string(),
                    });
                }
                owner = Some(session);
            }
        }
        owner.ok_or_else(|| ConduitError::UnknownTool(tool.to_string()))
    }

    /// The session for server `name`, if one is loaded.
    pub async fn session(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Name and state of every loaded session, in load order.
    pub async fn statuses(&self) -> Vec<(String, SessionState)> {
        let sessions = self.sessions.read().await.clone();
        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions {
            out.push((session.name().to_string(), session.state().await));
        }
        out
    }

    /// Stop every session concurrently. Failures are logged and do not stop
    /// the sweep.
    pub async fn stop_all(&self) {
        self.routes.write().await.clear();
        let sessions = self.sessions.read().await.clone();
        join_all(sessions.iter().map(|session| async {
            if let Err(e) = session.stop().await {
                warn!(server = %session.name(), error = %e, "error while stopping session");
            }
        }))
        .await;
    }
}

/// Merge per-server catalogs into one flat namespace, rejecting duplicates.
pub fn merge_catalogs(catalogs: Vec<Vec<ToolDescriptor>>) -> ConduitResult<Vec<ToolDescriptor>> {
    let mut owner: HashMap<String, String> = HashMap::new();
    let mut merged = Vec::new();

    for catalog in catalogs {
        for tool in catalog {
            match owner.entry(tool.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(tool.server.clone());
                    merged.push(tool);
                }
                Entry::Occupied(slot) => {
                    return Err(ConduitError::ToolNameCollision {
                        tool: tool.name,
                        first: slot.get().clone(),
                        second: tool.server,
                    });
                }
            }
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, server: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: String::new(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            server: server.to_string(),
        }
    }

    #[test]
    fn test_merge_disjoint_catalogs() {
        let merged = merge_catalogs(vec![
            vec![tool("celsius_to_fahrenheit", "temp"), tool("kelvin_to_celsius", "temp")],
            vec![tool("run_command", "term")],
        ])
        .unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].server, "temp");
        assert_eq!(merged[2].server, "term");
    }

    #[test]
    fn test_merge_collision_names_both_servers() {
        let err = merge_catalogs(vec![
            vec![tool("convert", "temp")],
            vec![tool("convert", "weather")],
        ])
        .unwrap_err();
        match err {
            ConduitError::ToolNameCollision { tool, first, second } => {
                assert_eq!(tool, "convert");
                assert_eq!(first, "temp");
                assert_eq!(second, "weather");
            }
            other => panic!("expected collision, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_server_names() {
        let registry = Registry::default();
        let err = registry
            .load(vec![
                ServerDescriptor::http("temp", "http://localhost:8001/mcp"),
                ServerDescriptor::http("temp", "http://localhost:8002/mcp"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, ConduitError::Config(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_empty_server_name() {
        let registry = Registry::default();
        let err = registry
            .load(vec![ServerDescriptor::http("  ", "http://localhost:8001/mcp")])
            .await
            .unwrap_err();
        assert!(matches!(err, ConduitError::Config(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool_before_start() {
        let registry = Registry::default();
        registry
            .load(vec![ServerDescriptor::stdio("term", "terminal-server", vec![])])
            .await
            .unwrap();
        let err = registry.session_for("run_command").await.unwrap_err();
        assert!(matches!(err, ConduitError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_start_all_reports_spawn_failures() {
        let registry = Registry::default();
        registry
            .load(vec![
                ServerDescriptor::stdio("ghost-a", "/nonexistent/a", vec![]),
                ServerDescriptor::stdio("ghost-b", "/nonexistent/b", vec![]),
            ])
            .await
            .unwrap();

        let report = registry.start_all().await;
        assert!(report.started.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert!(!report.all_started());

        for (_, state) in registry.statuses().await {
            assert_eq!(state, SessionState::Failed);
        }
    }
}
