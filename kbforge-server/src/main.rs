//! kbforge-server: REST + MCP HTTP surface for kbforge.

mod error;
mod rate_limit;
mod router;
mod routes;
mod state;

use clap::Parser;
use kbforge_config::KbForgeConfig;
use kbforge_core::traits::Embedder;
use kbforge_providers::{HttpEmbedder, HttpLlmClient, ProviderConfig};
use kbforge_rag::chunking::{counter_for_model, Chunker};
use kbforge_rag::embeddings::{CachedEmbedder, EmbeddingCache, EmbeddingCacheConfig};
use kbforge_rag::ingest::RetryConfig;
use kbforge_rag::Ingestor;
use kbforge_retrieval::rerank::LlmReranker;
use kbforge_tenancy::{EngineCache, EngineCacheConfig, EngineDeps, KbRegistry};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kbforge-server", about = "Multi-tenant RAG service over REST and MCP")]
struct Cli {
    /// Path to a kbforge.toml config file; falls back to built-in defaults
    /// and KBFORGE_* environment variables when absent.
    #[arg(long, env = "KBFORGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let cli = Cli::parse();
    let config = KbForgeConfig::load(cli.config.as_deref())?;

    let storage_dir = PathBuf::from(&config.storage_dir);
    std::fs::create_dir_all(&storage_dir)?;
    let db_path = storage_dir.join("kbforge.sqlite3");
    let pool = kbforge_storage::new_pool(&db_path, config.http.storage_pool_min as u32, config.http.storage_pool_max as u32)?;

    let registry = Arc::new(KbRegistry::with_pool(pool.clone()).await?);

    let embed_provider = ProviderConfig::from_env(
        "embed",
        &ProviderConfig::new("embed", "http://localhost:11434/v1", config.embedding.model_name.clone()),
    );
    let llm_provider = ProviderConfig::from_env("llm", &ProviderConfig::new("llm", "http://localhost:11434/v1", config.llm.model_name.clone()));

    let raw_embedder = Arc::new(HttpEmbedder::new(embed_provider, config.embedding.dimensions)?);
    let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(raw_embedder, EmbeddingCache::new(EmbeddingCacheConfig::default())));
    let llm = Arc::new(HttpLlmClient::new(llm_provider, config.llm.temperature, config.llm.context_window, config.llm.max_output_tokens)?);
    let reranker = Arc::new(LlmReranker::new(llm.clone()));
    let deps = EngineDeps {
        embedder: embedder.clone(),
        llm: llm.clone(),
        reranker: Some(reranker),
    };

    let tokenizer = counter_for_model(&config.embedding.model_name);
    let chunker = Chunker::new(tokenizer, config.chunking.chunk_size_tokens, config.chunking.chunk_overlap_tokens);
    let ingestor = Arc::new(Ingestor::new(chunker, embedder, RetryConfig::default()));

    let cache = Arc::new(EngineCache::new(EngineCacheConfig {
        ttl: Duration::from_secs(config.engine_cache.ttl_s),
        max_entries: config.engine_cache.max_entries,
    }));

    let retrieval_config = Arc::new(config.retrieval.clone());
    let dispatcher = Arc::new(kbforge_mcp::Dispatcher::new(
        registry.clone(),
        cache.clone(),
        pool.clone(),
        deps.clone(),
        config.retrieval.clone(),
        config.embedding.dimensions,
    ));

    let state = AppState {
        registry,
        cache,
        dispatcher,
        ingestor,
        pool,
        deps,
        retrieval_config,
        default_embed_dim: config.embedding.dimensions,
    };

    let app = router::build_router(state, &config.http.allowed_origins, config.http.rate_limit_per_minute);

    let addr: SocketAddr = config.http.bind_addr.parse()?;
    tracing::info!(%addr, "starting kbforge-server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
