//! `POST /mcp` and `POST /mcp/kb/{slug}`: the JSON-RPC 2.0 MCP tool surface
//! laid over HTTP.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kbforge_core::error::KbError;
use kbforge_mcp::{parse_request, JsonRpcResponse};
use tracing::Span;

use crate::state::AppState;

/// JSON-RPC 2.0 wraps every outcome, including application errors, in an
/// HTTP 200 body; the one exception is an unknown per-KB slug, which
/// surfaces as a plain HTTP 404 so reverse proxies and clients route it
/// the same way they would any other missing resource.
pub(crate) struct McpResponse(StatusCode, JsonRpcResponse);

impl IntoResponse for McpResponse {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

#[tracing::instrument(skip(state, body), fields(request_id = tracing::field::Empty))]
pub async fn mcp_global(State(state): State<AppState>, body: String) -> McpResponse {
    match parse_request(&body) {
        Ok(req) => {
            Span::current().record("request_id", tracing::field::debug(&req.id));
            McpResponse(StatusCode::OK, state.dispatcher.handle_global(req).await)
        }
        Err(parse_error) => McpResponse(StatusCode::OK, parse_error),
    }
}

#[tracing::instrument(skip(state, body), fields(kb = %slug, request_id = tracing::field::Empty))]
pub async fn mcp_for_kb(State(state): State<AppState>, Path(slug): Path<String>, body: String) -> McpResponse {
    let req = match parse_request(&body) {
        Ok(req) => req,
        Err(parse_error) => return McpResponse(StatusCode::OK, parse_error),
    };
    let id = req.id.clone();
    Span::current().record("request_id", tracing::field::debug(&id));
    match state.dispatcher.handle_for_kb(&slug, req).await {
        Ok(response) => McpResponse(StatusCode::OK, response),
        Err(KbError::NotFound { message }) => McpResponse(StatusCode::NOT_FOUND, JsonRpcResponse::err(id, -32602, message)),
        Err(other) => {
            let code = other.jsonrpc_code();
            McpResponse(StatusCode::OK, JsonRpcResponse::err(id, code, other.to_string()))
        }
    }
}
