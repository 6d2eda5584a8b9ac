//! KB Registry: create/list/get/delete knowledge bases.

use chrono::Utc;
use kbforge_core::error::KbError;
use kbforge_core::types::{slugify, KbType, KnowledgeBase};
use kbforge_storage::{new_pool, SqlitePool, SqliteVectorStore};
use kbforge_utils::identifier::sanitize_table_name;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

pub struct KbRegistry {
    pool: SqlitePool,
}

impl KbRegistry {
    /// Opens (creating if needed) the registry database at `path`.
    ///
    /// # Errors
    /// Returns [`KbError::StorageError`] if the pool or registry table cannot
    /// be created.
    pub async fn open(path: &Path, min_idle: u32, max_size: u32) -> Result<Self, KbError> {
        let pool = new_pool(path, min_idle, max_size)?;
        Self::with_pool(pool).await
    }

    /// Opens the registry against an already-constructed pool (sharing a
    /// database with per-KB chunk tables).
    ///
    /// # Errors
    /// Returns [`KbError::StorageError`] if the registry table cannot be created.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, KbError> {
        let init_pool = pool.clone();
        tokio::task::spawn_blocking(move || -> Result<(), KbError> {
            let conn = init_pool.get().map_err(|e| KbError::StorageError {
                message: format!("sqlite pool exhausted: {e}"),
            })?;
            create_registry_table(&conn)
        })
        .await
        .map_err(|e| KbError::internal(format!("registry init task panicked: {e}")))??;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, KbError> {
        self.pool.get().map_err(|e| KbError::StorageError {
            message: format!("sqlite pool exhausted: {e}"),
        })
    }

    /// Creates a new KB: generates and collision-checks its slug, inserts the
    /// registry row, and allocates its physical chunk table.
    ///
    /// # Errors
    /// Returns [`KbError::AlreadyExists`] on a name or slug collision.
    pub async fn create(
        &self,
        name: &str,
        kb_type: KbType,
        description: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
        embed_dim: usize,
    ) -> Result<KnowledgeBase, KbError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(KbError::invalid_input(format!("name '{name}' has no URL-safe characters")));
        }

        let conn = self.conn()?;
        let name_owned = name.to_string();
        let slug_for_check = slug.clone();
        let now = Utc::now();
        let metadata_json = serde_json::to_string(&metadata).map_err(|e| KbError::internal(format!("failed to serialize kb metadata: {e}")))?;

        let kb = tokio::task::spawn_blocking(move || -> Result<KnowledgeBase, KbError> {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM kb_registry WHERE name = ?1 OR slug = ?2",
                    params![name_owned, slug_for_check],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to check kb uniqueness: {e}"),
                })?;
            if existing.is_some() {
                return Err(KbError::AlreadyExists {
                    message: format!("knowledge base '{name_owned}' or slug '{slug_for_check}' already exists"),
                });
            }

            conn.execute(
                "INSERT INTO kb_registry (name, slug, kb_type, description, metadata, embed_dim, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    name_owned,
                    slug_for_check,
                    kb_type.as_str(),
                    description,
                    metadata_json,
                    embed_dim as i64,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| KbError::StorageError {
                message: format!("failed to insert kb registry row: {e}"),
            })?;

            Ok(KnowledgeBase {
                id: conn.last_insert_rowid(),
                name: name_owned,
                slug: slug_for_check,
                kb_type,
                description,
                metadata,
                embed_dim,
                created_at: now,
                updated_at: now,
            })
        })
        .await
        .map_err(|e| KbError::internal(format!("registry task panicked: {e}")))??;

        // Allocate physical chunk storage for the KB.
        // The store handle itself is discarded; the Engine Cache reopens it
        // lazily when the KB is first queried.
        SqliteVectorStore::open(self.pool.clone(), &kb.slug, embed_dim).await?;

        Ok(kb)
    }

    /// Lists knowledge bases, optionally filtered by `kb_type`.
    ///
    /// # Errors
    /// Returns [`KbError::StorageError`] on query failure.
    pub async fn list(&self, kb_type: Option<KbType>) -> Result<Vec<KnowledgeBase>, KbError> {
        let conn = self.conn()?;
        tokio::task::spawn_blocking(move || -> Result<Vec<KnowledgeBase>, KbError> {
            let query = match kb_type {
                Some(_) => "SELECT id, name, slug, kb_type, description, metadata, embed_dim, created_at, updated_at
                             FROM kb_registry WHERE kb_type = ?1 ORDER BY name",
                None => "SELECT id, name, slug, kb_type, description, metadata, embed_dim, created_at, updated_at
                         FROM kb_registry ORDER BY name",
            };
            let mut stmt = conn.prepare(query).map_err(|e| KbError::StorageError {
                message: format!("failed to prepare kb listing: {e}"),
            })?;

            let rows = match kb_type {
                Some(t) => stmt.query_map(params![t.as_str()], row_to_kb),
                None => stmt.query_map([], row_to_kb),
            }
            .map_err(|e| KbError::StorageError {
                message: format!("failed to list knowledge bases: {e}"),
            })?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to read kb row: {e}"),
                })
        })
        .await
        .map_err(|e| KbError::internal(format!("registry task panicked: {e}")))?
    }

    /// # Errors
    /// Returns [`KbError::NotFound`] if no KB has this name.
    pub async fn get_by_name(&self, name: &str) -> Result<KnowledgeBase, KbError> {
        self.get_by_column("name", name).await
    }

    /// # Errors
    /// Returns [`KbError::NotFound`] if no KB has this slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<KnowledgeBase, KbError> {
        self.get_by_column("slug", slug).await
    }

    async fn get_by_column(&self, column: &'static str, value: &str) -> Result<KnowledgeBase, KbError> {
        let conn = self.conn()?;
        let value_owned = value.to_string();
        tokio::task::spawn_blocking(move || -> Result<KnowledgeBase, KbError> {
            conn.query_row(
                &format!(
                    "SELECT id, name, slug, kb_type, description, metadata, embed_dim, created_at, updated_at
                     FROM kb_registry WHERE {column} = ?1"
                ),
                params![value_owned],
                row_to_kb,
            )
            .optional()
            .map_err(|e| KbError::StorageError {
                message: format!("failed to look up kb by {column}: {e}"),
            })?
            .ok_or_else(|| KbError::not_found(format!("no knowledge base with {column} '{value_owned}'")))
        })
        .await
        .map_err(|e| KbError::internal(format!("registry task panicked: {e}")))?
    }

    /// Drops the KB's physical chunk table and registry row atomically.
    ///
    /// # Errors
    /// Returns [`KbError::NotFound`] if no KB has this name.
    pub async fn delete(&self, name: &str) -> Result<(), KbError> {
        let kb = self.get_by_name(name).await?;
        let table = sanitize_table_name(&kb.slug)?;
        let mut conn = self.conn()?;
        let name_owned = name.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), KbError> {
            let tx = conn.transaction().map_err(|e| KbError::StorageError {
                message: format!("failed to start delete transaction: {e}"),
            })?;
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {table}")).map_err(|e| KbError::StorageError {
                message: format!("failed to drop chunk table {table}: {e}"),
            })?;
            tx.execute("DELETE FROM kb_registry WHERE name = ?1", params![name_owned])
                .map_err(|e| KbError::StorageError {
                    message: format!("failed to delete kb registry row: {e}"),
                })?;
            tx.commit().map_err(|e| KbError::StorageError {
                message: format!("failed to commit delete transaction: {e}"),
            })
        })
        .await
        .map_err(|e| KbError::internal(format!("registry task panicked: {e}")))?
    }
}

fn create_registry_table(conn: &Connection) -> Result<(), KbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kb_registry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            kb_type TEXT NOT NULL,
            description TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            embed_dim INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .map_err(|e| KbError::StorageError {
        message: format!("failed to create kb_registry table: {e}"),
    })
}

fn row_to_kb(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeBase> {
    let kb_type_str: String = row.get("kb_type")?;
    let metadata_json: String = row.get("metadata")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(KnowledgeBase {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        kb_type: kb_type_str.parse().unwrap_or_default(),
        description: row.get("description")?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        embed_dim: row.get::<_, i64>("embed_dim")? as usize,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
