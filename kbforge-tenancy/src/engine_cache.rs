//! TTL + capacity-bounded cache of per-KB retrieval engines, with coalesced
//! concurrent construction.

use dashmap::DashMap;
use kbforge_core::error::KbError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct EngineCacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for EngineCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_entries: 10,
        }
    }
}

struct CacheEntry<T> {
    engine: Arc<T>,
    created_at: Instant,
}

/// Caches one engine per KB name. Eviction drops the cached `Arc<T>`; callers
/// should make `T::drop` release whatever clients/handles it owns.
pub struct EngineCache<T> {
    config: EngineCacheConfig,
    entries: DashMap<String, CacheEntry<T>>,
    inflight: DashMap<String, Arc<OnceCell<Result<Arc<T>, String>>>>,
}

impl<T: Send + Sync + 'static> EngineCache<T> {
    #[must_use]
    pub fn new(config: EngineCacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached engine for `key`, constructing it via `construct`
    /// on a miss or TTL expiry. Concurrent calls for the same key coalesce
    /// into a single construction.
    ///
    /// # Errors
    /// Propagates whatever error `construct` returns.
    pub async fn get_or_construct<F, Fut>(&self, key: &str, construct: F) -> Result<Arc<T>, KbError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, KbError>>,
    {
        if let Some(entry) = self.entries.get(key) {
            if entry.created_at.elapsed() <= self.config.ttl {
                return Ok(entry.engine.clone());
            }
        }
        self.entries.remove(key);

        let once = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = once
            .get_or_init(|| async { construct().await.map(Arc::new).map_err(|e| e.to_string()) })
            .await
            .clone();
        self.inflight.remove(key);

        match result {
            Ok(engine) => {
                self.insert_with_eviction(key.to_string(), engine.clone());
                Ok(engine)
            }
            Err(message) => Err(KbError::internal(message)),
        }
    }

    fn insert_with_eviction(&self, key: String, engine: Arc<T>) {
        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(&key) {
            if let Some(oldest_key) = self
                .entries
                .iter()
                .min_by_key(|e| e.value().created_at)
                .map(|e| e.key().clone())
            {
                self.entries.remove(&oldest_key);
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                engine,
                created_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine {
        close_counter: Arc<AtomicUsize>,
    }

    impl Drop for CountingEngine {
        fn drop(&mut self) {
            self.close_counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn constructs_on_miss_and_reuses_on_hit() {
        let cache: EngineCache<AtomicUsize> = EngineCache::new(EngineCacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            cache
                .get_or_construct("kb-a", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(AtomicUsize::new(0))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_reconstructed() {
        let cache: EngineCache<AtomicUsize> = EngineCache::new(EngineCacheConfig {
            ttl: Duration::from_millis(10),
            max_entries: 10,
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let build = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(AtomicUsize::new(0))
        };

        cache.get_or_construct("kb-a", || build(calls.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.get_or_construct("kb-a", || build(calls.clone())).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn evicts_oldest_entry_when_over_capacity() {
        let cache: EngineCache<AtomicUsize> = EngineCache::new(EngineCacheConfig {
            ttl: Duration::from_secs(600),
            max_entries: 2,
        });

        for key in ["a", "b", "c"] {
            cache.get_or_construct(key, || async { Ok(AtomicUsize::new(0)) }).await.unwrap();
        }

        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn eviction_releases_underlying_resources() {
        let cache: EngineCache<CountingEngine> = EngineCache::new(EngineCacheConfig {
            ttl: Duration::from_secs(600),
            max_entries: 1,
        });
        let close_counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_construct("a", || {
                let close_counter = close_counter.clone();
                async move { Ok(CountingEngine { close_counter }) }
            })
            .await
            .unwrap();
        cache
            .get_or_construct("b", || {
                let close_counter = close_counter.clone();
                async move { Ok(CountingEngine { close_counter }) }
            })
            .await
            .unwrap();

        assert_eq!(close_counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn construction_failure_is_not_cached() {
        let cache: EngineCache<AtomicUsize> = EngineCache::new(EngineCacheConfig::default());

        let first = cache
            .get_or_construct("a", || async { Err::<AtomicUsize, _>(KbError::internal("boom")) })
            .await;
        assert!(first.is_err());

        let second = cache.get_or_construct("a", || async { Ok(AtomicUsize::new(1)) }).await;
        assert!(second.is_ok());
    }
}
