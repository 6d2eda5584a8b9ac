//! Maps [`KbError`] onto the REST surface's `{detail: string}` error body
//! and matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kbforge_core::error::KbError;
use serde_json::json;

pub struct AppError(pub KbError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let detail = match &self.0 {
            KbError::Internal { .. } | KbError::StorageError { .. } => {
                tracing::error!(error = %self.0, "internal error handling request");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<KbError> for AppError {
    fn from(inner: KbError) -> Self {
        Self(inner)
    }
}
