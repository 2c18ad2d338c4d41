//! Stdio front end for an [`McpService`].
//!
//! Line-delimited JSON-RPC on the standard streams. Stdout carries protocol
//! frames only; all diagnostics go to stderr through tracing.

use crate::service::{McpService, PARSE_ERROR};
use conduit_mcp::protocol::JsonRpcResponse;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// Run `service` over stdin/stdout until stdin reaches end of file.
pub async fn run(service: McpService) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(message) => service.handle(message).await,
            Err(e) => {
                debug!(error = %e, "discarding malformed frame");
                Some(JsonRpcResponse::failure(
                    None,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ))
            }
        };

        if let Some(resp) = response {
            let frame = serde_json::to_string(&resp).map_err(std::io::Error::other)?;
            stdout.write_all(frame.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    debug!("stdin closed, shutting down");
    Ok(())
}
