//! `POST /api/kb/{name}/chat`.

use axum::extract::{Path, State};
use axum::Json;
use kbforge_core::types::QueryResult;
use kbforge_tenancy::SearchOverrides;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub use_hybrid: Option<bool>,
    #[serde(default)]
    pub use_rerank: Option<bool>,
    #[serde(default)]
    pub use_agentic: Option<bool>,
}

#[tracing::instrument(skip(state, request), fields(kb = %name, method = "chat"))]
pub async fn chat(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<QueryResult>, AppError> {
    let kb = state.registry.get_by_name(&name).await?;
    let engine = state.engine_for(&kb).await?;
    let overrides = SearchOverrides {
        top_k: request.top_k,
        use_hybrid: request.use_hybrid,
        use_rerank: request.use_rerank,
        use_agentic: request.use_agentic,
    };
    let result = engine.answer(&request.query, &overrides).await?;
    Ok(Json(result))
}
