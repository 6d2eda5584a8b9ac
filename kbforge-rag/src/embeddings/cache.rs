//! TTL-bounded LRU cache over embedding lookups, to avoid re-embedding
//! identical text across ingests and queries.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct EmbeddingCacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

struct Entry {
    embedding: Vec<f32>,
    created_at: Instant,
    last_accessed: Instant,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, Entry>>,
    config: EmbeddingCacheConfig,
    stats: RwLock<CacheStats>,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(config: EmbeddingCacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.write();
        let mut stats = self.stats.write();

        if let Some(entry) = entries.get_mut(key) {
            if entry.created_at.elapsed() > self.config.ttl {
                entries.remove(key);
                stats.evictions += 1;
                stats.misses += 1;
                return None;
            }
            entry.last_accessed = Instant::now();
            stats.hits += 1;
            Some(entry.embedding.clone())
        } else {
            stats.misses += 1;
            None
        }
    }

    pub fn put(&self, key: String, embedding: Vec<f32>) {
        let mut entries = self.entries.write();
        let mut stats = self.stats.write();

        if entries.len() >= self.config.max_entries {
            if let Some(lru_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&lru_key);
                stats.evictions += 1;
            }
        }

        let now = Instant::now();
        entries.insert(
            key,
            Entry {
                embedding,
                created_at: now,
                last_accessed: now,
            },
        );
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_after_put_and_misses_for_unknown_key() {
        let cache = EmbeddingCache::new(EmbeddingCacheConfig::default());
        cache.put("a".to_string(), vec![1.0, 2.0]);
        assert_eq!(cache.get("a"), Some(vec![1.0, 2.0]));
        assert!(cache.get("missing").is_none());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let cache = EmbeddingCache::new(EmbeddingCacheConfig {
            max_entries: 1,
            ttl: Duration::from_secs(60),
        });
        cache.put("a".to_string(), vec![1.0]);
        cache.put("b".to_string(), vec![2.0]);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(vec![2.0]));
    }

    #[test]
    fn expires_entries_past_ttl() {
        let cache = EmbeddingCache::new(EmbeddingCacheConfig {
            max_entries: 10,
            ttl: Duration::from_millis(1),
        });
        cache.put("a".to_string(), vec![1.0]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("a").is_none());
    }
}
