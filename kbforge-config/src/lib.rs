//! ABOUTME: Central configuration management for kbforge
//! ABOUTME: Layers built-in defaults, an optional TOML file, and env vars

use kbforge_core::types::KbType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod validation;

pub use validation::validate_config;

/// Configuration-layer errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration field '{field}': {message}")]
    Validation { field: String, message: String },
}

/// Embedding model identity and dimensionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimensions: usize,
    pub max_batch_size: usize,
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "text-embedding-default".to_string(),
            dimensions: 768,
            max_batch_size: 32,
            cache_capacity: 10_000,
        }
    }
}

/// LLM client parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model_name: String,
    pub temperature: f32,
    pub context_window: usize,
    pub max_output_tokens: usize,
    pub request_timeout_s: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_name: "synthesis-default".to_string(),
            temperature: 0.2,
            context_window: 4096,
            max_output_tokens: 800,
            request_timeout_s: 60,
        }
    }
}

/// Chunker parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size_tokens: usize,
    pub chunk_overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: 1024,
            chunk_overlap_tokens: 200,
        }
    }
}

/// Per-`kb_type` retrieval defaults. A tagged map, not a
/// subclass hierarchy —.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalDefaults {
    pub top_k: usize,
    pub min_score: f32,
    pub use_hybrid: bool,
    pub use_rerank: bool,
    pub rerank_top_n: usize,
    pub use_agentic: bool,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            top_k: 15,
            min_score: 0.5,
            use_hybrid: false,
            use_rerank: false,
            rerank_top_n: 10,
            use_agentic: false,
        }
    }
}

/// Retriever configuration: global overrides plus one [`RetrievalDefaults`]
/// per [`KbType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub defaults_by_kb_type: HashMap<String, RetrievalDefaults>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let mut defaults_by_kb_type = HashMap::new();
        defaults_by_kb_type.insert(KbType::Generic.to_string(), RetrievalDefaults::default());
        defaults_by_kb_type.insert(
            KbType::Code.to_string(),
            RetrievalDefaults {
                use_hybrid: true,
                ..RetrievalDefaults::default()
            },
        );
        defaults_by_kb_type.insert(
            KbType::Documentation.to_string(),
            RetrievalDefaults {
                use_hybrid: true,
                ..RetrievalDefaults::default()
            },
        );
        defaults_by_kb_type.insert(
            KbType::AgentOs.to_string(),
            RetrievalDefaults {
                use_hybrid: true,
                use_agentic: true,
                ..RetrievalDefaults::default()
            },
        );
        Self {
            defaults_by_kb_type,
        }
    }
}

impl RetrievalConfig {
    #[must_use]
    pub fn for_kb_type(&self, kb_type: KbType) -> RetrievalDefaults {
        self.defaults_by_kb_type
            .get(kb_type.as_str())
            .cloned()
            .unwrap_or_default()
    }
}

/// Engine Cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCacheConfig {
    pub ttl_s: u64,
    pub max_entries: usize,
}

impl Default for EngineCacheConfig {
    fn default() -> Self {
        Self {
            ttl_s: 600,
            max_entries: 10,
        }
    }
}

/// HTTP surface configuration: CORS and rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub storage_pool_min: usize,
    pub storage_pool_max: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            rate_limit_per_minute: 20,
            storage_pool_min: 1,
            storage_pool_max: 10,
        }
    }
}

/// Top-level configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KbForgeConfig {
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub engine_cache: EngineCacheConfig,
    pub http: HttpConfig,
    pub storage_dir: String,
    /// `dev`, `test`, or `production` — governs the wildcard-CORS check in
    /// [`validation::validate_config`].
    pub profile: String,
}

impl KbForgeConfig {
    /// Load defaults, then an optional TOML file at `path`, then
    /// `KBFORGE_*` environment variable overrides, then validate.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is malformed or validation fails.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default_profile();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults)
                .map_err(ConfigError::Load)?
                .clone(),
        );

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path.to_path_buf()));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KBFORGE")
                .separator("__")
                .try_parsing(true),
        );

        let built = builder.build()?;
        let cfg: Self = built.try_deserialize()?;
        validate_config(&cfg)?;
        Ok(cfg)
    }

    fn default_profile() -> Self {
        Self {
            profile: "dev".to_string(),
            storage_dir: "./data".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_defaults_match_spec_per_kb_type() {
        let cfg = RetrievalConfig::default();
        assert!(!cfg.for_kb_type(KbType::Generic).use_hybrid);
        assert!(cfg.for_kb_type(KbType::Code).use_hybrid);
        assert!(cfg.for_kb_type(KbType::Documentation).use_hybrid);
        assert!(cfg.for_kb_type(KbType::AgentOs).use_agentic);
    }

    #[test]
    fn load_with_no_file_uses_defaults() {
        let cfg = KbForgeConfig::load(None).unwrap();
        assert_eq!(cfg.chunking.chunk_size_tokens, 1024);
        assert_eq!(cfg.chunking.chunk_overlap_tokens, 200);
        assert_eq!(cfg.engine_cache.max_entries, 10);
    }

    #[test]
    fn load_from_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kbforge.toml");
        std::fs::write(
            &path,
            r#"
            [chunking]
            chunk_size_tokens = 512
            chunk_overlap_tokens = 64
            "#,
        )
        .unwrap();

        let cfg = KbForgeConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.chunking.chunk_size_tokens, 512);
        assert_eq!(cfg.chunking.chunk_overlap_tokens, 64);
    }
}
