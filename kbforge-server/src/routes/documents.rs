//! `/api/kb/{name}/upload` and document deletion.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use kbforge_core::error::KbError;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub chunks_ingested: usize,
}

#[tracing::instrument(skip(state, multipart), fields(kb = %name, method = "upload_document"))]
pub async fn upload_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let kb = state.registry.get_by_name(&name).await?;
    let engine = state.engine_for(&kb).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| KbError::invalid_input(format!("malformed multipart body: {e}")))?
        .ok_or_else(|| KbError::invalid_input("upload request carried no 'file' field"))?;

    let filename = field.file_name().map(str::to_string).unwrap_or_else(|| "upload.txt".to_string());
    let mime_hint = field.content_type().map(str::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|e| KbError::invalid_input(format!("failed to read upload body: {e}")))?;

    let result = state.ingestor.ingest(engine.store.as_ref(), &filename, mime_hint.as_deref(), &bytes).await?;
    Ok(Json(UploadResponse {
        chunks_ingested: result.chunks_ingested,
    }))
}

#[tracing::instrument(skip(state), fields(kb = %name, method = "delete_document"))]
pub async fn delete_document(
    State(state): State<AppState>,
    Path((name, filename)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let kb = state.registry.get_by_name(&name).await?;
    let engine = state.engine_for(&kb).await?;
    engine.store.delete_by_filename(&filename).await?;
    Ok(StatusCode::NO_CONTENT)
}
