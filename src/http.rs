//! Streamable HTTP ingress: POST /mcp carrying the same JSON-RPC payloads
//! as the stdio transport. Runs alongside stdio; neither blocks the other.

use crate::{JsonRpcRequest, JsonRpcResponse, McpServer};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub(crate) fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .with_state(server)
}

async fn handle_mcp(
    State(server): State<Arc<McpServer>>,
    Json(payload): Json<Value>,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_value(payload) {
        Ok(r) => r,
        Err(e) => {
            let response = JsonRpcResponse::error(
                Value::Null,
                -32700,
                format!("Parse error: {e}"),
            );
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    match server.handle_request(request).await {
        Some(response) => Json(response).into_response(),
        // Notifications get no body
        None => StatusCode::ACCEPTED.into_response(),
    }
}

pub(crate) async fn serve(addr: String, server: Arc<McpServer>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "http ingress listening");
    axum::serve(listener, router(server)).await?;
    Ok(())
}
