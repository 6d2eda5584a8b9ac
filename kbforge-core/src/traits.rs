//! Seam traits implemented by other crates (providers, storage, retrieval).
//!
//! Keeping these here — rather than in the crates that implement them — lets
//! `kbforge-retrieval` and `kbforge-rag` depend only on `kbforge-core` instead
//! of on each concrete backend.

use crate::error::Result;
use crate::types::{Chunk, DocumentSummary, KbStats};
use async_trait::async_trait;

/// Text → fixed-dimension dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text. Deterministic for a fixed model.
    ///
    /// # Errors
    /// Returns [`crate::error::KbError::EmbedderUnavailable`] on transport failure.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// The fixed output dimension for this embedder instance.
    fn dimension(&self) -> usize;

    /// Model identity, for logging and KB metadata.
    fn model_name(&self) -> &str;
}

/// A chat-completion capable LLM client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run a single completion with the given system + user prompt.
    ///
    /// # Errors
    /// Returns [`crate::error::KbError::LlmUnavailable`] or
    /// [`crate::error::KbError::LlmTimeout`].
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Provider-reported context window, used to validate prompt size before
    /// calling.
    fn max_context_tokens(&self) -> usize;

    fn max_output_tokens(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// One row to persist: `(text, metadata, node_id, embedding)`.
#[derive(Debug, Clone)]
pub struct InsertRow {
    pub text: String,
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
    pub node_id: Option<String>,
    pub embedding: Vec<f32>,
}

/// Per-KB vector store contract. Implementations MUST NOT
/// allow a query bound to one KB to observe another KB's rows — tenancy is
/// enforced by construction (one store handle per physical table), not by a
/// runtime filter.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a batch of rows atomically: all rows land, or none do.
    async fn insert(&self, rows: Vec<InsertRow>) -> Result<Vec<i64>>;

    /// K-nearest-neighbor search by cosine similarity, sorted descending by
    /// score, with `score < min_score` excluded.
    async fn knn(&self, query_vec: &[f32], k: usize, min_score: f32) -> Result<Vec<(Chunk, f32)>>;

    /// All chunks in the KB, for lexical (BM25) scoring in hybrid mode.
    async fn all_chunks(&self) -> Result<Vec<Chunk>>;

    /// Documents grouped by `metadata.filename`.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Delete every chunk belonging to `filename`.
    async fn delete_by_filename(&self, filename: &str) -> Result<usize>;

    async fn stats(&self) -> Result<KbStats>;
}
