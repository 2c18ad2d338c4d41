//! Axum front end for an [`McpService`].
//!
//! One route, `POST /mcp`, carrying one JSON-RPC message per request.
//! Notifications are acknowledged with an empty `202 Accepted`.

use crate::service::{McpService, PARSE_ERROR};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use conduit_mcp::protocol::JsonRpcResponse;
use std::sync::Arc;

/// Router exposing `service` at `POST /mcp`.
pub fn router(service: Arc<McpService>) -> Router {
    Router::new()
        .route("/mcp", post(handle))
        .with_state(service)
}

/// Serve `service` on an already-bound listener until the task is dropped.
pub async fn serve(
    service: Arc<McpService>,
    listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
    axum::serve(listener, router(service)).await
}

async fn handle(State(service): State<Arc<McpService>>, body: String) -> Response {
    let message: serde_json::Value = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(e) => {
            let resp = JsonRpcResponse::failure(None, PARSE_ERROR, format!("parse error: {e}"));
            return Json(resp).into_response();
        }
    };

    match service.handle(message).await {
        Some(resp) => Json(resp).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
