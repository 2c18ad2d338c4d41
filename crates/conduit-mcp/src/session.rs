//! One protocol session per configured server.
//!
//! A session wraps a [`Transport`] with the MCP handshake, a correlation
//! table for outstanding requests, and timeout policy. Responses are matched
//! purely by correlation id, so requests may be pipelined and answered out
//! of order. A transport failure is fatal for its own session only.

use crate::protocol::{InitializeResult, JsonRpcRequest, JsonRpcResponse, WireToolDef, WireToolResult, PROTOCOL_VERSION};
use crate::transport::{HttpTransport, StdioTransport, Transport};
use conduit_core::{
    ConduitError, ConduitResult, InvocationResult, ServerDescriptor, ToolCallError,
    ToolDescriptor, TransportKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timeout policy for a session. Both values are configuration, not hidden
/// constants.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Bound on the whole handshake (initialize + tool discovery).
    /// Default: 10 seconds.
    pub handshake_timeout: Duration,
    /// Bound on each individual request awaiting its response.
    /// Default: 30 seconds.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, transport not yet opened.
    Disconnected,
    /// Transport being opened.
    Connecting,
    /// Handshake and tool discovery in progress.
    Discovering,
    /// Handshake complete; `invoke` is legal.
    Ready,
    /// `stop` in progress.
    Closing,
    /// Stopped cleanly.
    Closed,
    /// Terminal failure; reachable from any non-terminal state.
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Discovering => "discovering",
            SessionState::Ready => "ready",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

type Reply = ConduitResult<JsonRpcResponse>;
type PendingMap = HashMap<u64, oneshot::Sender<Reply>>;

/// A protocol peer over one transport.
pub struct Session {
    descriptor: ServerDescriptor,
    config: SessionConfig,
    state: Arc<RwLock<SessionState>>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    tools: RwLock<Vec<ToolDescriptor>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session for one server. Nothing is opened until [`start`].
    ///
    /// [`start`]: Session::start
    pub fn new(descriptor: ServerDescriptor, config: SessionConfig) -> Self {
        Self {
            descriptor,
            config,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            transport: RwLock::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            tools: RwLock::new(Vec::new()),
            reader: Mutex::new(None),
        }
    }

    /// The configured server name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The descriptor this session was built from.
    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Whether `invoke` is currently legal.
    pub async fn is_ready(&self) -> bool {
        self.state().await == SessionState::Ready
    }

    /// Tools discovered during the handshake.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().await.clone()
    }

    /// Open the configured transport and run the handshake.
    pub async fn start(&self) -> ConduitResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Disconnected {
                return Err(ConduitError::InvalidState {
                    server: self.name().to_string(),
                    state: state.to_string(),
                });
            }
            *state = SessionState::Connecting;
        }

        let transport: Arc<dyn Transport> = match &self.descriptor.transport {
            TransportKind::Stdio { command, args, env } => {
                match StdioTransport::spawn(self.name(), command, args, env) {
                    Ok(t) => Arc::new(t),
                    Err(e) => {
                        *self.state.write().await = SessionState::Failed;
                        return Err(e);
                    }
                }
            }
            TransportKind::Http { url } => match HttpTransport::connect(self.name(), url) {
                Ok(t) => Arc::new(t),
                Err(e) => {
                    *self.state.write().await = SessionState::Failed;
                    return Err(e);
                }
            },
        };

        self.attach(transport).await
    }

    /// Run the handshake over a pre-opened transport. This is the seam used
    /// by custom transports and by tests; [`start`] funnels through it.
    ///
    /// [`start`]: Session::start
    pub async fn start_with(&self, transport: Arc<dyn Transport>) -> ConduitResult<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Disconnected | SessionState::Connecting => {}
                _ => {
                    return Err(ConduitError::InvalidState {
                        server: self.name().to_string(),
                        state: state.to_string(),
                    });
                }
            }
            *state = SessionState::Connecting;
        }
        self.attach(transport).await
    }

    async fn attach(&self, transport: Arc<dyn Transport>) -> ConduitResult<()> {
        *self.transport.write().await = Some(transport.clone());
        self.spawn_reader(transport).await;

        *self.state.write().await = SessionState::Discovering;

        let handshake_secs = self.config.handshake_timeout.as_secs();
        let outcome = tokio::time::timeout(self.config.handshake_timeout, self.handshake()).await;
        let tools = match outcome {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                self.fail().await;
                return Err(ConduitError::Handshake {
                    server: self.name().to_string(),
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                self.fail().await;
                return Err(ConduitError::Handshake {
                    server: self.name().to_string(),
                    detail: format!("no handshake response within {handshake_secs}s"),
                });
            }
        };

        info!(
            server = %self.name(),
            transport = self.descriptor.transport.label(),
            tools = tools.len(),
            "session ready"
        );
        *self.tools.write().await = tools;
        *self.state.write().await = SessionState::Ready;
        Ok(())
    }

    async fn handshake(&self) -> ConduitResult<Vec<ToolDescriptor>> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "conduit",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let resp = self.request("initialize", Some(params)).await?;
        let result = resp.result.ok_or_else(|| ConduitError::Handshake {
            server: self.name().to_string(),
            detail: "empty initialize result".to_string(),
        })?;
        let init: InitializeResult = serde_json::from_value(result)?;
        debug!(
            server = %self.name(),
            protocol = %init.protocol_version,
            peer = init.server_info.as_ref().map(|p| p.name.as_str()).unwrap_or("unknown"),
            "initialized"
        );

        self.notify("notifications/initialized", None).await?;

        let resp = self.request("tools/list", None).await?;
        let result = resp.result.ok_or_else(|| ConduitError::Handshake {
            server: self.name().to_string(),
            detail: "empty tools/list result".to_string(),
        })?;
        let defs: Vec<WireToolDef> = serde_json::from_value(
            result.get("tools").cloned().unwrap_or(serde_json::json!([])),
        )?;

        Ok(defs
            .into_iter()
            .map(|def| ToolDescriptor {
                name: def.name,
                description: def.description,
                input_schema: def.input_schema,
                server: self.name().to_string(),
            })
            .collect())
    }

    /// Invoke a tool on this server. Legal only in the `Ready` state.
    ///
    /// Handler-reported errors come back as a failed [`InvocationResult`];
    /// session-level failures (timeout, closed transport) are `Err` and get
    /// normalized by the dispatcher.
    pub async fn invoke(
        &self,
        tool: &str,
        arguments: serde_json::Value,
    ) -> ConduitResult<InvocationResult> {
        let state = self.state().await;
        if state != SessionState::Ready {
            return Err(ConduitError::InvalidState {
                server: self.name().to_string(),
                state: state.to_string(),
            });
        }

        let params = serde_json::json!({ "name": tool, "arguments": arguments });
        let resp = self.request("tools/call", Some(params)).await?;
        let correlation_id = resp.id.unwrap_or(0);

        if let Some(err) = resp.error {
            return Ok(InvocationResult::failure(
                correlation_id,
                ToolCallError::handler(tool, format!("{} (code {})", err.message, err.code)),
            ));
        }

        let Some(result) = resp.result else {
            return Ok(InvocationResult::failure(
                correlation_id,
                ToolCallError::handler(tool, "empty tools/call result"),
            ));
        };

        let wire: WireToolResult = serde_json::from_value(result)?;
        if wire.is_error {
            let detail = wire.into_payload();
            return Ok(InvocationResult::failure(
                correlation_id,
                ToolCallError::handler(tool, detail.as_str().unwrap_or(&detail.to_string()).to_string()),
            ));
        }
        Ok(InvocationResult::success(correlation_id, wire.into_payload()))
    }

    /// Cancel outstanding requests and close the transport. Idempotent and
    /// safe to call from a failure path. `Failed` is terminal: a failed
    /// session already released its transport and keeps reporting `Failed`.
    pub async fn stop(&self) -> ConduitResult<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Closing | SessionState::Closed | SessionState::Failed => {
                    return Ok(());
                }
                _ => *state = SessionState::Closing,
            }
        }

        self.drain_pending(|| ConduitError::SessionClosed {
            server: self.name().to_string(),
        })
        .await;

        if let Some(transport) = self.transport.write().await.take() {
            transport.close().await?;
        }
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }

        self.tools.write().await.clear();
        *self.state.write().await = SessionState::Closed;
        info!(server = %self.name(), "session closed");
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send one request and wait for its correlated response or timeout.
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> ConduitResult<JsonRpcResponse> {
        let transport = self
            .transport
            .read()
            .await
            .clone()
            .ok_or_else(|| ConduitError::TransportClosed {
                server: self.name().to_string(),
            })?;

        let id = self.next_id();
        let req = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        // One deadline covers the send and the response wait. An HTTP send
        // does not return until the server answers, so the send must sit
        // inside the timeout too.
        let exchange = async {
            transport.send(&req).await?;
            match rx.await {
                Ok(reply) => reply,
                // Sender dropped without a reply: the session was torn down.
                Err(_) => Err(ConduitError::SessionClosed {
                    server: self.name().to_string(),
                }),
            }
        };

        match tokio::time::timeout(self.config.request_timeout, exchange).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => {
                self.pending.lock().await.remove(&id);
                Err(e)
            }
            Err(_) => {
                // Evict so a late response is treated as unmatched.
                self.pending.lock().await.remove(&id);
                Err(ConduitError::Timeout {
                    server: self.name().to_string(),
                    timeout_secs: self.config.request_timeout.as_secs(),
                })
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> ConduitResult<()> {
        let transport = self
            .transport
            .read()
            .await
            .clone()
            .ok_or_else(|| ConduitError::TransportClosed {
                server: self.name().to_string(),
            })?;
        transport.send(&JsonRpcRequest::notification(method, params)).await
    }

    async fn spawn_reader(&self, transport: Arc<dyn Transport>) {
        let pending = self.pending.clone();
        let state = self.state.clone();
        let server = self.name().to_string();

        let handle = tokio::spawn(async move {
            loop {
                match transport.receive().await {
                    Ok(resp) => match resp.id {
                        Some(id) => {
                            let tx = pending.lock().await.remove(&id);
                            match tx {
                                Some(tx) => {
                                    let _ = tx.send(Ok(resp));
                                }
                                None => {
                                    // Late or unmatched response: discard.
                                    warn!(server = %server, id, "response with unknown correlation id discarded");
                                }
                            }
                        }
                        None => {
                            debug!(server = %server, "server notification ignored");
                        }
                    },
                    Err(e) => {
                        let closing = matches!(
                            *state.read().await,
                            SessionState::Closing | SessionState::Closed
                        );
                        if !closing {
                            warn!(server = %server, error = %e, "transport lost, failing session");
                            *state.write().await = SessionState::Failed;
                            let mut map = pending.lock().await;
                            for (_, tx) in map.drain() {
                                let _ = tx.send(Err(ConduitError::TransportClosed {
                                    server: server.clone(),
                                }));
                            }
                        }
                        break;
                    }
                }
            }
        });

        *self.reader.lock().await = Some(handle);
    }

    async fn drain_pending<F>(&self, make_err: F)
    where
        F: Fn() -> ConduitError,
    {
        let mut map = self.pending.lock().await;
        for (_, tx) in map.drain() {
            let _ = tx.send(Err(make_err()));
        }
    }

    async fn fail(&self) {
        *self.state.write().await = SessionState::Failed;
        self.drain_pending(|| ConduitError::SessionClosed {
            server: self.name().to_string(),
        })
        .await;
        if let Some(transport) = self.transport.write().await.take() {
            let _ = transport.close().await;
        }
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let config = SessionConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Ready.to_string(), "ready");
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn test_new_session_is_disconnected() {
        let session = Session::new(
            ServerDescriptor::stdio("term", "terminal-server", vec![]),
            SessionConfig::default(),
        );
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert!(!session.is_ready().await);
        assert!(session.tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_before_start_is_invalid_state() {
        let session = Session::new(
            ServerDescriptor::stdio("term", "terminal-server", vec![]),
            SessionConfig::default(),
        );
        let result = session.invoke("run_command", serde_json::json!({})).await;
        assert!(matches!(result, Err(ConduitError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_start_with_missing_binary_fails_session() {
        let session = Session::new(
            ServerDescriptor::stdio("ghost", "/nonexistent/mcp-server", vec![]),
            SessionConfig::default(),
        );
        let result = session.start().await;
        assert!(matches!(result, Err(ConduitError::Connection { .. })));
        assert_eq!(session.state().await, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let session = Session::new(
            ServerDescriptor::stdio("term", "terminal-server", vec![]),
            SessionConfig::default(),
        );
        session.stop().await.unwrap();
        session.stop().await.unwrap();
        assert_eq!(session.state().await, SessionState::Closed);
    }
}
