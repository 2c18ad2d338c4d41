//! Transport abstraction over the two channel kinds.
//!
//! A [`Transport`] owns one OS-level resource (a child process or an HTTP
//! connection pool) and exchanges discrete JSON-RPC messages. The session
//! layer drives `receive` from its own reader task, so a slow peer never
//! blocks anything but its own session.

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use conduit_core::{ConduitError, ConduitResult};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Grace period between closing a child's stdin and killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// One open channel to a server.
///
/// `receive` blocks until one complete message arrives or the channel
/// closes; deadlines are the caller's responsibility. `close` is idempotent
/// and must release the underlying resource on every path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one framed message.
    async fn send(&self, message: &JsonRpcRequest) -> ConduitResult<()>;

    /// Block until one complete message is available.
    async fn receive(&self) -> ConduitResult<JsonRpcResponse>;

    /// Release the underlying resource.
    async fn close(&self) -> ConduitResult<()>;
}

// ---------------------------------------------------------------------------
// Stdio
// ---------------------------------------------------------------------------

/// Subprocess transport: line-delimited JSON-RPC over the child's standard
/// streams. Stderr is drained to diagnostics and never parsed as protocol.
pub struct StdioTransport {
    server: String,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<BufReader<ChildStdout>>,
    child: Mutex<Option<Child>>,
}

impl StdioTransport {
    /// Spawn `command` with isolated standard streams.
    pub fn spawn(
        server: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> ConduitResult<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, val) in env {
            cmd.env(key, val);
        }

        let mut child = cmd.spawn().map_err(|e| ConduitError::Connection {
            server: server.to_string(),
            detail: format!("failed to spawn '{command}': {e}"),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| ConduitError::Connection {
            server: server.to_string(),
            detail: "child stdin not available".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ConduitError::Connection {
            server: server.to_string(),
            detail: "child stdout not available".to_string(),
        })?;

        if let Some(stderr) = child.stderr.take() {
            let name = server.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %name, line = %line, "server stderr");
                }
            });
        }

        Ok(Self {
            server: server.to_string(),
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(Some(child)),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: &JsonRpcRequest) -> ConduitResult<()> {
        let frame = serde_json::to_string(message)?;
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| ConduitError::TransportClosed {
            server: self.server.clone(),
        })?;

        let write = async {
            stdin.write_all(frame.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        write.await.map_err(|e| ConduitError::Transport {
            server: self.server.clone(),
            detail: format!("stdin write failed: {e}"),
        })
    }

    async fn receive(&self) -> ConduitResult<JsonRpcResponse> {
        let mut reader = self.stdout.lock().await;
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| ConduitError::Transport {
                    server: self.server.clone(),
                    detail: format!("stdout read failed: {e}"),
                })?;
            if read == 0 {
                return Err(ConduitError::TransportClosed {
                    server: self.server.clone(),
                });
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    // Malformed frames are discarded, not fatal.
                    debug!(server = %self.server, line = %trimmed, error = %e, "non-JSON-RPC line discarded");
                }
            }
        }
    }

    async fn close(&self) -> ConduitResult<()> {
        // Dropping stdin signals EOF; give the child a grace period before
        // killing it.
        self.stdin.lock().await.take();

        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(server = %self.server, status = %status, "child exited");
            }
            Ok(Err(e)) => {
                warn!(server = %self.server, error = %e, "waiting for child failed");
            }
            Err(_) => {
                warn!(server = %self.server, "child did not exit in time, killing");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP / streamable
// ---------------------------------------------------------------------------

/// HTTP transport: each message is POSTed to the endpoint; responses arrive
/// either as a JSON body or as `data:` events on an SSE stream, and are
/// queued for `receive` so correlation works the same way as over stdio.
pub struct HttpTransport {
    server: String,
    url: String,
    client: reqwest::Client,
    inbox_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<JsonRpcResponse>>>,
    inbox: Mutex<mpsc::UnboundedReceiver<JsonRpcResponse>>,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Validate the endpoint and build the transport. Reachability is
    /// checked lazily: the first `send` opens the connection.
    pub fn connect(server: &str, url: &str) -> ConduitResult<Self> {
        reqwest::Url::parse(url).map_err(|e| ConduitError::Connection {
            server: server.to_string(),
            detail: format!("malformed endpoint '{url}': {e}"),
        })?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Ok(Self {
            server: server.to_string(),
            url: url.to_string(),
            client: reqwest::Client::new(),
            inbox_tx: std::sync::Mutex::new(Some(inbox_tx)),
            inbox: Mutex::new(inbox_rx),
            closed: AtomicBool::new(false),
        })
    }

    fn queue(&self, resp: JsonRpcResponse) {
        // A missing sender just means the transport was closed mid-flight.
        if let Ok(guard) = self.inbox_tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(resp);
            }
        }
    }

    async fn drain_sse(&self, resp: reqwest::Response) -> ConduitResult<()> {
        let mut stream = resp.bytes_stream();
        let mut buf = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ConduitError::Transport {
                server: self.server.clone(),
                detail: format!("event stream read failed: {e}"),
            })?;
            buf.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buf.find("\n\n") {
                let event: String = buf.drain(..pos + 2).collect();
                for line in event.lines() {
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    match serde_json::from_str::<JsonRpcResponse>(data.trim()) {
                        Ok(msg) => self.queue(msg),
                        Err(e) => {
                            debug!(server = %self.server, error = %e, "malformed SSE event discarded");
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: &JsonRpcRequest) -> ConduitResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConduitError::TransportClosed {
                server: self.server.clone(),
            });
        }

        let resp = self
            .client
            .post(&self.url)
            .header("accept", "application/json, text/event-stream")
            .json(message)
            .send()
            .await
            .map_err(|e| ConduitError::Transport {
                server: self.server.clone(),
                detail: format!("POST failed: {e}"),
            })?;

        if !resp.status().is_success() {
            return Err(ConduitError::Transport {
                server: self.server.clone(),
                detail: format!("server answered {}", resp.status()),
            });
        }

        // Notifications are acknowledged with an empty 202.
        if resp.status() == reqwest::StatusCode::ACCEPTED || message.id.is_none() {
            return Ok(());
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("text/event-stream") {
            self.drain_sse(resp).await
        } else {
            let body = resp.json::<JsonRpcResponse>().await.map_err(|e| {
                ConduitError::Transport {
                    server: self.server.clone(),
                    detail: format!("invalid response body: {e}"),
                }
            })?;
            self.queue(body);
            Ok(())
        }
    }

    async fn receive(&self) -> ConduitResult<JsonRpcResponse> {
        let mut inbox = self.inbox.lock().await;
        inbox.recv().await.ok_or_else(|| ConduitError::TransportClosed {
            server: self.server.clone(),
        })
    }

    async fn close(&self) -> ConduitResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the sender wakes any blocked `receive` with end-of-stream
        // without touching the receiver, which the reader task may hold.
        if let Ok(mut guard) = self.inbox_tx.lock() {
            guard.take();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_nonexistent_command() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let result = StdioTransport::spawn("bad", "/nonexistent/mcp-server", &[], &HashMap::new());
        assert!(matches!(result, Err(ConduitError::Connection { .. })));
    }

    #[test]
    fn test_connect_malformed_url() {
        let result = HttpTransport::connect("bad", "not a url");
        assert!(matches!(result, Err(ConduitError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_http_close_is_idempotent() {
        let transport = HttpTransport::connect("t", "http://localhost:1/mcp").unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let req = JsonRpcRequest::new(1, "tools/list", None);
        assert!(matches!(
            transport.send(&req).await,
            Err(ConduitError::TransportClosed { .. })
        ));
        assert!(matches!(
            transport.receive().await,
            Err(ConduitError::TransportClosed { .. })
        ));
    }
}
