pub mod cache;
pub mod cached_embedder;

pub use cache::{EmbeddingCache, EmbeddingCacheConfig};
pub use cached_embedder::CachedEmbedder;
