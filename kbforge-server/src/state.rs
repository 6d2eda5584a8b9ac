//! Shared application state threaded through every Axum handler.

use kbforge_config::RetrievalConfig;
use kbforge_core::error::KbError;
use kbforge_core::types::KnowledgeBase;
use kbforge_mcp::Dispatcher;
use kbforge_rag::Ingestor;
use kbforge_storage::SqlitePool;
use kbforge_tenancy::{EngineCache, EngineDeps, KbEngine, KbRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<KbRegistry>,
    pub cache: Arc<EngineCache<KbEngine>>,
    pub dispatcher: Arc<Dispatcher>,
    pub ingestor: Arc<Ingestor>,
    pub pool: SqlitePool,
    pub deps: EngineDeps,
    pub retrieval_config: Arc<RetrievalConfig>,
    pub default_embed_dim: usize,
}

impl AppState {
    /// Looks up (or lazily builds) the cached engine for `kb`.
    ///
    /// # Errors
    /// Returns [`KbError::StorageError`] if the KB's chunk table cannot be opened.
    pub async fn engine_for(&self, kb: &KnowledgeBase) -> Result<Arc<KbEngine>, KbError> {
        let pool = self.pool.clone();
        let kb_owned = kb.clone();
        let deps = self.deps.clone();
        let retrieval = self.retrieval_config.for_kb_type(kb.kb_type);
        self.cache
            .get_or_construct(&kb.slug, move || KbEngine::build(pool, kb_owned, deps, retrieval))
            .await
    }
}

/// Builds a fully-wired [`AppState`] over a temp-file SQLite pool with
/// fixed-output embedder/LLM doubles, shared by the route test modules.
#[cfg(test)]
pub mod test_support {
    use super::AppState;
    use async_trait::async_trait;
    use kbforge_config::RetrievalConfig;
    use kbforge_core::error::KbError;
    use kbforge_core::traits::{Embedder, LlmClient};
    use kbforge_mcp::Dispatcher;
    use kbforge_rag::chunking::Chunker;
    use kbforge_rag::embeddings::{CachedEmbedder, EmbeddingCache, EmbeddingCacheConfig};
    use kbforge_rag::ingest::RetryConfig;
    use kbforge_rag::Ingestor;
    use kbforge_tenancy::{EngineCache, EngineCacheConfig, EngineDeps, KbRegistry};
    use kbforge_utils::tokenize::CharacterTokenCounter;
    use std::sync::Arc;

    pub const EMBED_DIM: usize = 4;

    struct FixedEmbedder;
    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, KbError> {
            Ok(vec![0.1, 0.2, 0.3, 0.4])
        }
        fn dimension(&self) -> usize {
            EMBED_DIM
        }
        fn model_name(&self) -> &str {
            "fixed-test-embedder"
        }
    }

    struct EchoLlm;
    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, KbError> {
            Ok("test answer".to_string())
        }
        fn max_context_tokens(&self) -> usize {
            4096
        }
        fn max_output_tokens(&self) -> usize {
            256
        }
        fn model_name(&self) -> &str {
            "echo-test-llm"
        }
    }

    /// Keeps the backing temp directory alive for the lifetime of the state.
    pub struct TestHarness {
        pub state: AppState,
        _dir: tempfile::TempDir,
    }

    pub async fn build() -> TestHarness {
        let dir = tempfile::tempdir().unwrap();
        let pool = kbforge_storage::new_pool(&dir.path().join("kbforge.sqlite3"), 1, 4).unwrap();
        let registry = Arc::new(KbRegistry::with_pool(pool.clone()).await.unwrap());

        let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(Arc::new(FixedEmbedder), EmbeddingCache::new(EmbeddingCacheConfig::default())));
        let llm: Arc<dyn LlmClient> = Arc::new(EchoLlm);
        let deps = EngineDeps {
            embedder: embedder.clone(),
            llm: llm.clone(),
            reranker: None,
        };

        let chunker = Chunker::new(Box::new(CharacterTokenCounter::new(4)), 200, 20);
        let ingestor = Arc::new(Ingestor::new(chunker, embedder, RetryConfig::default()));

        let cache = Arc::new(EngineCache::new(EngineCacheConfig::default()));
        let retrieval_config = Arc::new(RetrievalConfig::default());

        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            cache.clone(),
            pool.clone(),
            deps.clone(),
            (*retrieval_config).clone(),
            EMBED_DIM,
        ));

        let state = AppState {
            registry,
            cache,
            dispatcher,
            ingestor,
            pool,
            deps,
            retrieval_config,
            default_embed_dim: EMBED_DIM,
        };

        TestHarness { state, _dir: dir }
    }
}
