//! Wraps any [`Embedder`] with an LRU cache and a dimension-mismatch guard.

use async_trait::async_trait;
use kbforge_core::error::KbError;
use kbforge_core::traits::Embedder;
use std::sync::Arc;

use super::cache::EmbeddingCache;

pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: EmbeddingCache,
    expected_dimension: usize,
}

impl CachedEmbedder {
    #[must_use]
    pub fn new(inner: Arc<dyn Embedder>, cache: EmbeddingCache) -> Self {
        let expected_dimension = inner.dimension();
        Self {
            inner,
            cache,
            expected_dimension,
        }
    }

    #[must_use]
    pub fn cache_stats(&self) -> super::cache::CacheStats {
        self.cache.stats()
    }

    fn cache_key(&self, text: &str) -> String {
        format!("{}:{text}", self.inner.model_name())
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, KbError> {
        let key = self.cache_key(text);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let embedding = self.inner.embed_text(text).await?;
        if embedding.len() != self.expected_dimension {
            return Err(KbError::EmbedderUnavailable {
                message: format!(
                    "embedder '{}' returned {}-dim vector, kb expects {}",
                    self.inner.model_name(),
                    embedding.len(),
                    self.expected_dimension
                ),
            });
        }

        self.cache.put(key, embedding.clone());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.expected_dimension
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
