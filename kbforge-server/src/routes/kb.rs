//! `/api/kb` endpoints: registry CRUD, stats, and document listing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use kbforge_core::types::{KbStats, KbType, KnowledgeBase};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateKbRequest {
    pub name: String,
    #[serde(default)]
    pub kb_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn list_kbs(State(state): State<AppState>) -> Result<Json<Vec<KnowledgeBase>>, AppError> {
    let kbs = state.registry.list(None).await?;
    Ok(Json(kbs))
}

pub async fn create_kb(State(state): State<AppState>, Json(request): Json<CreateKbRequest>) -> Result<Json<KnowledgeBase>, AppError> {
    let kb_type = match request.kb_type {
        Some(s) => s.parse::<KbType>()?,
        None => KbType::default(),
    };
    let kb = state
        .registry
        .create(&request.name, kb_type, request.description, HashMap::new(), state.default_embed_dim)
        .await?;
    Ok(Json(kb))
}

#[tracing::instrument(skip(state), fields(kb = %name, method = "delete_kb"))]
pub async fn delete_kb(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, AppError> {
    let kb = state.registry.get_by_name(&name).await?;
    state.registry.delete(&name).await?;
    state.cache.invalidate(&kb.slug);
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state), fields(kb = %name, method = "kb_stats"))]
pub async fn kb_stats(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<KbStats>, AppError> {
    let kb = state.registry.get_by_name(&name).await?;
    let engine = state.engine_for(&kb).await?;
    let stats = engine.store.stats().await?;
    Ok(Json(stats))
}

#[tracing::instrument(skip(state), fields(kb = %name, method = "list_documents"))]
pub async fn list_documents(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<kbforge_core::types::DocumentSummary>>, AppError> {
    let kb = state.registry.get_by_name(&name).await?;
    let engine = state.engine_for(&kb).await?;
    let docs = engine.store.list_documents().await?;
    Ok(Json(docs))
}
