//! Bundles the per-KB retrieval stack into one cacheable unit.

use kbforge_core::error::KbError;
use kbforge_core::traits::{Embedder, LlmClient, VectorStore};
use kbforge_core::types::{KnowledgeBase, QueryResult};
use kbforge_retrieval::rerank::Reranker;
use kbforge_retrieval::{AgenticPlanner, RetrieveOptions, Retriever, Synthesizer};
use kbforge_storage::{SqlitePool, SqliteVectorStore};
use std::sync::Arc;
use std::time::Instant;

/// The provider handles a [`KbEngine`] is built from. Constructed once per
/// process (or per provider config change), then reused across every KB.
#[derive(Clone)]
pub struct EngineDeps {
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LlmClient>,
    pub reranker: Option<Arc<dyn Reranker>>,
}

/// Everything needed to answer queries against one knowledge base: its
/// physical store plus a retrieval/synthesis/agentic stack wired to it.
pub struct KbEngine {
    pub kb: KnowledgeBase,
    pub store: Arc<dyn VectorStore>,
    pub retriever: Retriever,
    pub synthesizer: Synthesizer,
    pub agentic: AgenticPlanner,
    pub defaults: RetrieveOptions,
    /// Whether `search`-class calls should route through `agentic` unless
    /// the caller explicitly overrides it.
    pub use_agentic_by_default: bool,
}

impl KbEngine {
    /// Opens the KB's physical chunk table and wires a retrieval, synthesis,
    /// and agentic-planning stack to it. The planner is always built; the
    /// `agent_os` KB type merely changes `use_agentic_by_default`.
    ///
    /// # Errors
    /// Returns [`KbError::StorageError`] if the chunk table cannot be opened.
    pub async fn build(
        pool: SqlitePool,
        kb: KnowledgeBase,
        deps: EngineDeps,
        retrieval: kbforge_config::RetrievalDefaults,
    ) -> Result<Self, KbError> {
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::open(pool, &kb.slug, kb.embed_dim).await?);

        let retriever = Retriever::new(deps.embedder.clone(), store.clone(), deps.reranker.clone());
        let synthesizer = Synthesizer::new(deps.llm.clone());

        let sub_retriever = Retriever::new(deps.embedder.clone(), store.clone(), deps.reranker.clone());
        let sub_synthesizer = Synthesizer::new(deps.llm.clone());
        let agentic = AgenticPlanner::new(deps.llm.clone(), sub_retriever, sub_synthesizer);

        let use_agentic_by_default = retrieval.use_agentic;

        Ok(Self {
            kb,
            store,
            retriever,
            synthesizer,
            agentic,
            defaults: retrieval.into(),
            use_agentic_by_default,
        })
    }

    /// Runs the retrieve (+ optional rerank/hybrid) and synthesize (or
    /// agentic plan-and-answer) pipeline, applying per-call overrides on top
    /// of this KB's configured defaults. Shared by the MCP dispatcher and
    /// the REST `chat`/`search` handlers so both surfaces answer identically.
    ///
    /// # Errors
    /// Propagates retrieval, synthesis, or LLM errors.
    pub async fn answer(&self, query: &str, overrides: &SearchOverrides) -> Result<QueryResult, KbError> {
        let mut opts = self.defaults.clone();
        if let Some(v) = overrides.top_k {
            opts.top_k = v;
        }
        if let Some(v) = overrides.use_hybrid {
            opts.use_hybrid = v;
        }
        if let Some(v) = overrides.use_rerank {
            opts.use_rerank = v;
        }
        let use_agentic = overrides.use_agentic.unwrap_or(self.use_agentic_by_default);

        let started = Instant::now();
        if use_agentic {
            let mut result = self.agentic.plan_and_answer(query, &opts, 0).await?;
            result.retrieval_ms = started.elapsed().as_millis() as u64;
            Ok(result)
        } else {
            let candidates = self.retriever.retrieve(query, &opts).await?;
            let retrieval_ms = started.elapsed().as_millis() as u64;
            let synth_started = Instant::now();
            let synthesis = self.synthesizer.synthesize(query, &candidates).await?;
            Ok(QueryResult {
                answer: synthesis.answer,
                sources: synthesis.sources,
                sub_questions: None,
                retrieval_ms,
                synthesis_ms: synth_started.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Per-call overrides of a KB's configured retrieval defaults, as accepted
/// by the MCP `search`/`search_knowledge_base` tools and the REST `chat`
/// endpoint.
#[derive(Debug, Clone, Default)]
pub struct SearchOverrides {
    pub top_k: Option<usize>,
    pub use_hybrid: Option<bool>,
    pub use_rerank: Option<bool>,
    pub use_agentic: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbforge_core::types::{slugify, KbType, NO_INFORMATION_SENTENCE};
    use std::collections::HashMap;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, KbError> {
            Ok(vec![0.1, 0.2])
        }
        fn dimension(&self) -> usize {
            2
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, KbError> {
            Ok("answer".to_string())
        }
        fn max_context_tokens(&self) -> usize {
            4096
        }
        fn max_output_tokens(&self) -> usize {
            800
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn test_kb() -> KnowledgeBase {
        let now = chrono::Utc::now();
        KnowledgeBase {
            id: 1,
            name: "Docs".to_string(),
            slug: slugify("Docs"),
            kb_type: KbType::Generic,
            description: None,
            metadata: HashMap::new(),
            embed_dim: 2,
            created_at: now,
            updated_at: now,
        }
    }

    async fn build_test_engine(dir: &tempfile::TempDir) -> KbEngine {
        let pool = kbforge_storage::new_pool(&dir.path().join("kb.sqlite3"), 1, 4).unwrap();
        let deps = EngineDeps {
            embedder: Arc::new(FixedEmbedder),
            llm: Arc::new(EchoLlm),
            reranker: None,
        };
        KbEngine::build(pool, test_kb(), deps, kbforge_config::RetrievalDefaults::default()).await.unwrap()
    }

    #[tokio::test]
    async fn build_wires_a_working_store_and_retriever() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_test_engine(&dir).await;
        assert!(!engine.use_agentic_by_default);
    }

    #[tokio::test]
    async fn answer_on_an_empty_kb_yields_no_information() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_test_engine(&dir).await;
        let result = engine.answer("what is in here?", &SearchOverrides::default()).await.unwrap();
        assert_eq!(result.answer, NO_INFORMATION_SENTENCE);
    }

    #[tokio::test]
    async fn answer_honors_an_explicit_agentic_override() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_test_engine(&dir).await;
        let overrides = SearchOverrides {
            use_agentic: Some(true),
            ..SearchOverrides::default()
        };
        let result = engine.answer("what is in here?", &overrides).await.unwrap();
        assert!(result.sub_questions.is_some());
    }
}
