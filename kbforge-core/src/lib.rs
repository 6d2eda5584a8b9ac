//! ABOUTME: Core types, error taxonomy, and seam traits shared workspace-wide
//! ABOUTME: No dependency on storage, providers, or HTTP — the lowest layer

pub mod error;
pub mod traits;
pub mod types;

pub mod prelude {
    pub use crate::error::{KbError, Result};
    pub use crate::traits::{Embedder, InsertRow, LlmClient, VectorStore};
    pub use crate::types::{
        Chunk, DocumentSummary, KbStats, KbType, KnowledgeBase, QueryResult, SourceEntry,
        SubQuestionAnswer, NO_INFORMATION_SENTENCE,
    };
}
