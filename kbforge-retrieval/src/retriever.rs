//! Vector / hybrid / rerank retrieval paths.

use kbforge_core::error::KbError;
use kbforge_core::traits::{Embedder, VectorStore};
use kbforge_core::types::Chunk;
use std::sync::Arc;

use crate::fusion::{reciprocal_rank_fusion, DEFAULT_K0};
use crate::lexical::Bm25Scorer;
use crate::rerank::{rerank, Reranker};

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub top_k: usize,
    pub min_score: f32,
    pub use_hybrid: bool,
    pub use_rerank: bool,
    pub rerank_top_n: usize,
}

impl From<kbforge_config::RetrievalDefaults> for RetrieveOptions {
    fn from(defaults: kbforge_config::RetrievalDefaults) -> Self {
        Self {
            top_k: defaults.top_k,
            min_score: defaults.min_score,
            use_hybrid: defaults.use_hybrid,
            use_rerank: defaults.use_rerank,
            rerank_top_n: defaults.rerank_top_n,
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    bm25: Bm25Scorer,
    reranker: Option<Arc<dyn Reranker>>,
}

impl Retriever {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, reranker: Option<Arc<dyn Reranker>>) -> Self {
        Self {
            embedder,
            store,
            bm25: Bm25Scorer::default(),
            reranker,
        }
    }

    /// Runs the configured retrieval path. Edge cases.6: an
    /// empty KB or an all-below-`min_score` result set both yield `[]`.
    ///
    /// # Errors
    /// Propagates [`KbError::EmbedderUnavailable`] or storage errors.
    pub async fn retrieve(&self, question: &str, opts: &RetrieveOptions) -> Result<Vec<(Chunk, f32)>, KbError> {
        let query_vec = self.embedder.embed_text(question).await?;
        let vector_ranked = self.store.knn(&query_vec, opts.top_k, opts.min_score).await?;

        let mut candidates = if opts.use_hybrid {
            let all_chunks = self.store.all_chunks().await?;
            let lexical_ranked: Vec<(Chunk, f32)> = self
                .bm25
                .rank(question, &all_chunks)
                .into_iter()
                .map(|(idx, score)| (all_chunks[idx].clone(), score))
                .collect();

            reciprocal_rank_fusion(&vector_ranked, &lexical_ranked, DEFAULT_K0, opts.top_k)
        } else {
            vector_ranked
        };

        if opts.use_rerank {
            if let Some(reranker) = &self.reranker {
                candidates = rerank(reranker.as_ref(), question, candidates, opts.rerank_top_n).await?;
            } else {
                tracing::warn!("use_rerank requested but no reranker configured; skipping rerank pass");
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbforge_core::types::{DocumentSummary, KbStats};
    use std::collections::HashMap;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, KbError> {
            Ok(vec![1.0, 0.0])
        }
        fn dimension(&self) -> usize {
            2
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct FakeStore {
        knn_results: Vec<(Chunk, f32)>,
        all: Vec<Chunk>,
    }

    #[async_trait]
    impl VectorStore for FakeStore {
        async fn insert(&self, _rows: Vec<kbforge_core::traits::InsertRow>) -> Result<Vec<i64>, KbError> {
            Ok(Vec::new())
        }
        async fn knn(&self, _q: &[f32], k: usize, min_score: f32) -> Result<Vec<(Chunk, f32)>, KbError> {
            Ok(self
                .knn_results
                .iter()
                .filter(|(_, s)| *s >= min_score)
                .take(k)
                .cloned()
                .collect())
        }
        async fn all_chunks(&self) -> Result<Vec<Chunk>, KbError> {
            Ok(self.all.clone())
        }
        async fn list_documents(&self) -> Result<Vec<DocumentSummary>, KbError> {
            Ok(Vec::new())
        }
        async fn delete_by_filename(&self, _f: &str) -> Result<usize, KbError> {
            Ok(0)
        }
        async fn stats(&self) -> Result<KbStats, KbError> {
            Ok(KbStats {
                document_count: 0,
                chunk_count: 0,
                last_updated: None,
            })
        }
    }

    fn chunk(id: i64, text: &str) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            metadata: HashMap::new(),
            node_id: None,
            embedding: vec![1.0, 0.0],
        }
    }

    fn default_opts() -> RetrieveOptions {
        RetrieveOptions {
            top_k: 15,
            min_score: 0.5,
            use_hybrid: false,
            use_rerank: false,
            rerank_top_n: 10,
        }
    }

    #[tokio::test]
    async fn empty_kb_returns_empty_results() {
        let store = Arc::new(FakeStore {
            knn_results: Vec::new(),
            all: Vec::new(),
        });
        let retriever = Retriever::new(Arc::new(FixedEmbedder), store, None);
        let results = retriever.retrieve("question", &default_opts()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn vector_only_path_returns_knn_results() {
        let store = Arc::new(FakeStore {
            knn_results: vec![(chunk(1, "a"), 0.9)],
            all: vec![chunk(1, "a")],
        });
        let retriever = Retriever::new(Arc::new(FixedEmbedder), store, None);
        let results = retriever.retrieve("question", &default_opts()).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn hybrid_path_fuses_vector_and_lexical_rankings() {
        let all = vec![chunk(1, "rust memory safety"), chunk(2, "unrelated content here")];
        let store = Arc::new(FakeStore {
            knn_results: vec![(all[0].clone(), 0.9), (all[1].clone(), 0.6)],
            all: all.clone(),
        });
        let retriever = Retriever::new(Arc::new(FixedEmbedder), store, None);
        let mut opts = default_opts();
        opts.use_hybrid = true;

        let results = retriever.retrieve("rust memory safety", &opts).await.unwrap();
        assert_eq!(results[0].0.id, 1);
    }
}
