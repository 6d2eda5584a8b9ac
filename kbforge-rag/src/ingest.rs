//! Document ingestion: extract → chunk → embed → persist.

use chrono::Utc;
use kbforge_core::error::KbError;
use kbforge_core::traits::{Embedder, InsertRow, VectorStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::chunking::Chunker;
use crate::extract;

/// Retry policy for transient embedder failures: exponential
/// backoff, bounded attempt count.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub chunks_ingested: usize,
    pub filename: String,
}

pub struct Ingestor {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    retry: RetryConfig,
}

impl Ingestor {
    #[must_use]
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>, retry: RetryConfig) -> Self {
        Self {
            chunker,
            embedder,
            retry,
        }
    }

    /// Runs the full ingestion pipeline for one document.
    ///
    /// # Errors
    /// - [`KbError::UnsupportedOrCorrupt`] if text extraction fails.
    /// - [`KbError::EmbedderUnavailable`] if embedding fails after retries.
    /// - [`KbError::StorageError`] if the persist step fails.
    pub async fn ingest(
        &self,
        store: &dyn VectorStore,
        filename: &str,
        mime_hint: Option<&str>,
        bytes: &[u8],
    ) -> Result<IngestResult, KbError> {
        let document = extract::extract(filename, mime_hint, bytes)?;
        let raw_chunks = self.chunker.chunk(&document.text);

        if raw_chunks.is_empty() {
            return Ok(IngestResult {
                chunks_ingested: 0,
                filename: filename.to_string(),
            });
        }

        let uploaded_at = Utc::now().to_rfc3339();
        let chunk_count = raw_chunks.len();
        let mut rows = Vec::with_capacity(chunk_count);

        for (index, raw_chunk) in raw_chunks.iter().enumerate() {
            let embedding = self.embed_with_retry(&raw_chunk.text).await?;

            let mut metadata = document.extra_metadata.clone();
            metadata.insert("filename".to_string(), Value::String(filename.to_string()));
            metadata.insert("chunk_index".to_string(), Value::from(index));
            metadata.insert("chunk_count".to_string(), Value::from(chunk_count));
            metadata.insert("uploaded_at".to_string(), Value::String(uploaded_at.clone()));
            if let Some(title) = &document.title {
                metadata.entry("title").or_insert_with(|| Value::String(title.clone()));
            }
            if !document.tags.is_empty() {
                metadata
                    .entry("tags")
                    .or_insert_with(|| Value::Array(document.tags.iter().cloned().map(Value::String).collect()));
            }

            rows.push(InsertRow {
                text: raw_chunk.text.clone(),
                metadata: metadata.into_iter().collect(),
                node_id: None,
                embedding,
            });
        }

        let ids = store.insert(rows).await?;

        Ok(IngestResult {
            chunks_ingested: ids.len(),
            filename: filename.to_string(),
        })
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, KbError> {
        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            match self.embedder.embed_text(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "embedder call failed, retrying");
                    last_err = Some(e);
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| KbError::EmbedderUnavailable {
            message: "embedder retries exhausted".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbforge_core::types::{Chunk, DocumentSummary, KbStats};
    use kbforge_utils::tokenize::CharacterTokenCounter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakyEmbedder {
        fail_times: AtomicUsize,
        dim: usize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, KbError> {
            if self.fail_times.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(KbError::EmbedderUnavailable {
                    message: "transient".to_string(),
                });
            }
            Ok(vec![0.1; self.dim])
        }
        fn dimension(&self) -> usize {
            self.dim
        }
        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        inserted: Mutex<Vec<InsertRow>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn insert(&self, rows: Vec<InsertRow>) -> Result<Vec<i64>, KbError> {
            let mut inserted = self.inserted.lock().unwrap();
            let start = inserted.len() as i64;
            let ids = (start..start + rows.len() as i64).collect();
            inserted.extend(rows);
            Ok(ids)
        }
        async fn knn(&self, _q: &[f32], _k: usize, _min: f32) -> Result<Vec<(Chunk, f32)>, KbError> {
            Ok(Vec::new())
        }
        async fn all_chunks(&self) -> Result<Vec<Chunk>, KbError> {
            Ok(Vec::new())
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

    fn chunker() -> Chunker {
        Chunker::new(Box::new(CharacterTokenCounter::new(1)), 100, 10)
    }

    #[tokio::test]
    async fn empty_document_ingests_zero_chunks_without_error() {
        let embedder = Arc::new(FlakyEmbedder {
            fail_times: AtomicUsize::new(0),
            dim: 4,
        });
        let ingestor = Ingestor::new(chunker(), embedder, RetryConfig::default());
        let store = RecordingStore::default();

        let result = ingestor.ingest(&store, "empty.txt", None, b"").await.unwrap();
        assert_eq!(result.chunks_ingested, 0);
    }

    #[tokio::test]
    async fn retries_transient_embedder_failures_then_succeeds() {
        let embedder = Arc::new(FlakyEmbedder {
            fail_times: AtomicUsize::new(1),
            dim: 4,
        });
        let ingestor = Ingestor::new(
            chunker(),
            embedder,
            RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                multiplier: 1.0,
                max_delay: Duration::from_millis(5),
            },
        );
        let store = RecordingStore::default();

        let result = ingestor.ingest(&store, "doc.txt", None, b"hello world").await.unwrap();
        assert_eq!(result.chunks_ingested, 1);
    }

    #[tokio::test]
    async fn surfaces_embedder_unavailable_after_exhausting_retries() {
        let embedder = Arc::new(FlakyEmbedder {
            fail_times: AtomicUsize::new(10),
            dim: 4,
        });
        let ingestor = Ingestor::new(
            chunker(),
            embedder,
            RetryConfig {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                multiplier: 1.0,
                max_delay: Duration::from_millis(5),
            },
        );
        let store = RecordingStore::default();

        let result = ingestor.ingest(&store, "doc.txt", None, b"hello world").await;
        assert!(matches!(result, Err(KbError::EmbedderUnavailable { .. })));
    }

    #[tokio::test]
    async fn chunk_metadata_includes_filename_and_index() {
        let embedder = Arc::new(FlakyEmbedder {
            fail_times: AtomicUsize::new(0),
            dim: 4,
        });
        let ingestor = Ingestor::new(chunker(), embedder, RetryConfig::default());
        let store = RecordingStore::default();

        ingestor
            .ingest(&store, "notes.txt", None, b"some content to chunk")
            .await
            .unwrap();

        let inserted = store.inserted.lock().unwrap();
        assert!(!inserted.is_empty());
        assert_eq!(
            inserted[0].metadata.get("filename").and_then(Value::as_str),
            Some("notes.txt")
        );
        assert_eq!(inserted[0].metadata.get("chunk_index").and_then(Value::as_u64), Some(0));
    }
}
