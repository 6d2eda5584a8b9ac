//! One [`SqliteVectorStore`] per KB: a physical `data_*` table backed by [`kbforge_vectorindex::VectorIndex`] for KNN search.

use async_trait::async_trait;
use kbforge_core::error::KbError;
use kbforge_core::traits::{InsertRow, VectorStore};
use kbforge_core::types::{Chunk, DocumentSummary, KbStats};
use kbforge_utils::identifier::sanitize_table_name;
use kbforge_vectorindex::{VectorIndex, VectorIndexConfig};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::pool::SqlitePool;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    table: String,
    dimension: usize,
    index: Arc<VectorIndex>,
}

impl SqliteVectorStore {
    /// Opens (creating if needed) the physical table for `kb_slug` and
    /// rebuilds its in-memory vector index from whatever rows already exist.
    ///
    /// # Errors
    /// Returns [`KbError::InvalidInput`] if `kb_slug` sanitizes to nothing,
    /// or [`KbError::StorageError`] on any SQLite failure.
    pub async fn open(pool: SqlitePool, kb_slug: &str, dimension: usize) -> Result<Self, KbError> {
        let table = sanitize_table_name(kb_slug)?;
        let store_pool = pool.clone();
        let table_for_blocking = table.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let conn = store_pool
                .get()
                .map_err(|e| KbError::StorageError {
                    message: format!("sqlite pool exhausted: {e}"),
                })?;
            create_table(&conn, &table_for_blocking)?;
            load_all(&conn, &table_for_blocking)
        })
        .await
        .map_err(|e| KbError::internal(format!("storage task panicked: {e}")))??;

        let index = Arc::new(VectorIndex::new(dimension, &VectorIndexConfig::default()));
        for chunk in &rows {
            if chunk.embedding.len() == dimension {
                index.insert(chunk.id, &chunk.embedding)?;
            }
        }

        Ok(Self {
            pool,
            table,
            dimension,
            index,
        })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, KbError> {
        self.pool.get().map_err(|e| KbError::StorageError {
            message: format!("sqlite pool exhausted: {e}"),
        })
    }
}

fn create_table(conn: &Connection, table: &str) -> Result<(), KbError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            metadata TEXT NOT NULL,
            node_id TEXT,
            embedding BLOB NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )"
    ))
    .map_err(|e| KbError::StorageError {
        message: format!("failed to create table {table}: {e}"),
    })
}

fn encode_embedding(vec: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let metadata_json: String = row.get("metadata")?;
    let embedding_bytes: Vec<u8> = row.get("embedding")?;
    Ok(Chunk {
        id: row.get("id")?,
        text: row.get("text")?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        node_id: row.get("node_id")?,
        embedding: decode_embedding(&embedding_bytes),
    })
}

fn load_all(conn: &Connection, table: &str) -> Result<Vec<Chunk>, KbError> {
    let mut stmt = conn
        .prepare(&format!("SELECT id, text, metadata, node_id, embedding FROM {table}"))
        .map_err(|e| KbError::StorageError {
            message: format!("failed to prepare load query: {e}"),
        })?;
    let rows = stmt
        .query_map([], row_to_chunk)
        .map_err(|e| KbError::StorageError {
            message: format!("failed to load chunks: {e}"),
        })?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| KbError::StorageError {
            message: format!("failed to read chunk row: {e}"),
        })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert(&self, rows: Vec<InsertRow>) -> Result<Vec<i64>, KbError> {
        for row in &rows {
            if row.embedding.len() != self.dimension {
                return Err(KbError::invalid_input(format!(
                    "row embedding has {} dims, kb expects {}",
                    row.embedding.len(),
                    self.dimension
                )));
            }
        }

        let table = self.table.clone();
        let mut conn = self.conn()?;
        let rows_for_index = rows.clone();
        let ids = tokio::task::spawn_blocking(move || -> Result<Vec<i64>, KbError> {
            let tx = conn.transaction().map_err(|e| KbError::StorageError {
                message: format!("failed to start transaction: {e}"),
            })?;
            let mut ids = Vec::with_capacity(rows.len());
            {
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT INTO {table} (text, metadata, node_id, embedding) VALUES (?1, ?2, ?3, ?4)"
                    ))
                    .map_err(|e| KbError::StorageError {
                        message: format!("failed to prepare insert: {e}"),
                    })?;
                for row in &rows {
                    let metadata_json = serde_json::to_string(&row.metadata).map_err(|e| {
                        KbError::internal(format!("failed to serialize chunk metadata: {e}"))
                    })?;
                    stmt.execute(params![
                        row.text,
                        metadata_json,
                        row.node_id,
                        encode_embedding(&row.embedding)
                    ])
                    .map_err(|e| KbError::StorageError {
                        message: format!("failed to insert chunk: {e}"),
                    })?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit().map_err(|e| KbError::StorageError {
                message: format!("failed to commit insert transaction: {e}"),
            })?;
            Ok(ids)
        })
        .await
        .map_err(|e| KbError::internal(format!("storage task panicked: {e}")))??;

        for (row, id) in rows_for_index.iter().zip(ids.iter()) {
            self.index.insert(*id, &row.embedding)?;
        }
        Ok(ids)
    }

    async fn knn(&self, query_vec: &[f32], k: usize, min_score: f32) -> Result<Vec<(Chunk, f32)>, KbError> {
        if query_vec.len() != self.dimension {
            return Err(KbError::invalid_input(format!(
                "query vector has {} dims, kb expects {}",
                query_vec.len(),
                self.dimension
            )));
        }
        let neighbors = self.index.search(query_vec, k)?;
        let qualifying: Vec<_> = neighbors.into_iter().filter(|n| n.score >= min_score).collect();
        if qualifying.is_empty() {
            return Ok(Vec::new());
        }

        let table = self.table.clone();
        let conn = self.conn()?;
        let ids: Vec<i64> = qualifying.iter().map(|n| n.row_id).collect();
        let mut chunks = tokio::task::spawn_blocking(move || -> Result<Vec<Chunk>, KbError> {
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT id, text, metadata, node_id, embedding FROM {table} WHERE id IN ({placeholders})"
                ))
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to prepare knn fetch: {e}"),
                })?;
            let params = rusqlite::params_from_iter(ids.iter());
            let rows = stmt.query_map(params, row_to_chunk).map_err(|e| KbError::StorageError {
                message: format!("failed to fetch knn rows: {e}"),
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to read knn row: {e}"),
                })
        })
        .await
        .map_err(|e| KbError::internal(format!("storage task panicked: {e}")))??;

        let mut out = Vec::with_capacity(qualifying.len());
        for neighbor in &qualifying {
            if let Some(pos) = chunks.iter().position(|c| c.id == neighbor.row_id) {
                out.push((chunks.swap_remove(pos), neighbor.score));
            }
        }
        Ok(out)
    }

    async fn all_chunks(&self) -> Result<Vec<Chunk>, KbError> {
        let table = self.table.clone();
        let conn = self.conn()?;
        tokio::task::spawn_blocking(move || load_all(&conn, &table))
            .await
            .map_err(|e| KbError::internal(format!("storage task panicked: {e}")))?
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, KbError> {
        let table = self.table.clone();
        let conn = self.conn()?;
        tokio::task::spawn_blocking(move || -> Result<Vec<DocumentSummary>, KbError> {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT json_extract(metadata, '$.filename') AS filename, COUNT(*) AS chunk_count
                     FROM {table}
                     WHERE json_extract(metadata, '$.filename') IS NOT NULL
                     GROUP BY filename
                     ORDER BY filename"
                ))
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to prepare document listing: {e}"),
                })?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(DocumentSummary {
                        filename: row.get("filename")?,
                        chunk_count: row.get("chunk_count")?,
                    })
                })
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to list documents: {e}"),
                })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to read document row: {e}"),
                })
        })
        .await
        .map_err(|e| KbError::internal(format!("storage task panicked: {e}")))?
    }

    async fn delete_by_filename(&self, filename: &str) -> Result<usize, KbError> {
        let table = self.table.clone();
        let conn = self.conn()?;
        let filename_owned = filename.to_string();
        let deleted_ids = tokio::task::spawn_blocking(move || -> Result<Vec<i64>, KbError> {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT id FROM {table} WHERE json_extract(metadata, '$.filename') = ?1"
                ))
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to prepare delete selection: {e}"),
                })?;
            let ids = stmt
                .query_map(params![filename_owned], |row| row.get::<_, i64>(0))
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to select rows to delete: {e}"),
                })?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to read delete candidate row: {e}"),
                })?;
            conn.execute(
                &format!("DELETE FROM {table} WHERE json_extract(metadata, '$.filename') = ?1"),
                params![filename_owned],
            )
            .map_err(|e| KbError::StorageError {
                message: format!("failed to delete rows: {e}"),
            })?;
            Ok(ids)
        })
        .await
        .map_err(|e| KbError::internal(format!("storage task panicked: {e}")))??;

        for id in &deleted_ids {
            self.index.tombstone(*id);
        }
        Ok(deleted_ids.len())
    }

    async fn stats(&self) -> Result<KbStats, KbError> {
        let table = self.table.clone();
        let conn = self.conn()?;
        tokio::task::spawn_blocking(move || -> Result<KbStats, KbError> {
            let chunk_count: usize = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to count chunks: {e}"),
                })?;
            let document_count: usize = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(DISTINCT json_extract(metadata, '$.filename')) FROM {table}"
                    ),
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to count documents: {e}"),
                })?;
            let last_updated: Option<String> = conn
                .query_row(&format!("SELECT MAX(created_at) FROM {table}"), [], |row| row.get(0))
                .optional()
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to read last_updated: {e}"),
                })?
                .flatten();
            let last_updated = last_updated.and_then(|s| {
                chrono::DateTime::parse_from_rfc3339(&s)
                    .ok()
                    .map(|dt| dt.with_timezone(&chrono::Utc))
            });
            Ok(KbStats {
                document_count,
                chunk_count,
                last_updated,
            })
        })
        .await
        .map_err(|e| KbError::internal(format!("storage task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::new_pool;
    use std::collections::HashMap;

    async fn fixture_store(dimension: usize) -> (tempfile::TempDir, SqliteVectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = new_pool(&dir.path().join("kb.sqlite3"), 1, 4).unwrap();
        let store = SqliteVectorStore::open(pool, "test kb!", dimension).await.unwrap();
        (dir, store)
    }

    fn row(text: &str, filename: &str, embedding: Vec<f32>) -> InsertRow {
        let mut metadata = HashMap::new();
        metadata.insert("filename".to_string(), serde_json::json!(filename));
        InsertRow {
            text: text.to_string(),
            metadata,
            node_id: None,
            embedding,
        }
    }

    #[tokio::test]
    async fn inserts_and_knn_roundtrips() {
        let (_dir, store) = fixture_store(4).await;
        let ids = store
            .insert(vec![
                row("alpha chunk", "a.md", vec![1.0, 0.0, 0.0, 0.0]),
                row("beta chunk", "b.md", vec![0.0, 1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let results = store.knn(&[1.0, 0.0, 0.0, 0.0], 5, 0.0).await.unwrap();
        assert_eq!(results[0].0.text, "alpha chunk");
    }

    #[tokio::test]
    async fn knn_respects_min_score() {
        let (_dir, store) = fixture_store(4).await;
        store
            .insert(vec![row("alpha", "a.md", vec![0.0, 1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let results = store.knn(&[1.0, 0.0, 0.0, 0.0], 5, 0.5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn list_documents_groups_by_filename() {
        let (_dir, store) = fixture_store(4).await;
        store
            .insert(vec![
                row("c1", "a.md", vec![1.0, 0.0, 0.0, 0.0]),
                row("c2", "a.md", vec![0.0, 1.0, 0.0, 0.0]),
                row("c3", "b.md", vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        let a = docs.iter().find(|d| d.filename == "a.md").unwrap();
        assert_eq!(a.chunk_count, 2);
    }

    #[tokio::test]
    async fn delete_by_filename_removes_rows_and_excludes_from_knn() {
        let (_dir, store) = fixture_store(4).await;
        store
            .insert(vec![row("c1", "a.md", vec![1.0, 0.0, 0.0, 0.0])])
            .await
            .unwrap();

        let deleted = store.delete_by_filename("a.md").await.unwrap();
        assert_eq!(deleted, 1);

        let results = store.knn(&[1.0, 0.0, 0.0, 0.0], 5, 0.0).await.unwrap();
        assert!(results.is_empty());

        let remaining = store.all_chunks().await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn stats_reports_counts() {
        let (_dir, store) = fixture_store(4).await;
        store
            .insert(vec![
                row("c1", "a.md", vec![1.0, 0.0, 0.0, 0.0]),
                row("c2", "b.md", vec![0.0, 1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.document_count, 2);
        assert!(stats.last_updated.is_some());
    }

    #[tokio::test]
    async fn rejects_embedding_dimension_mismatch_on_insert() {
        let (_dir, store) = fixture_store(4).await;
        let result = store.insert(vec![row("c1", "a.md", vec![1.0, 0.0])]).await;
        assert!(result.is_err());
    }
}
