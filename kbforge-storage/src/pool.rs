//! Connection pooling for the on-disk SQLite database all KBs share.

use kbforge_core::error::KbError;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// Opens (creating if needed) the SQLite database at `path` and returns a
/// pooled connection manager sized between `min_idle` and `max_size`.
///
/// # Errors
/// Returns [`KbError::StorageError`] if the pool cannot be built.
pub fn new_pool(path: &Path, min_idle: u32, max_size: u32) -> Result<SqlitePool, KbError> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    r2d2::Pool::builder()
        .max_size(max_size.max(min_idle).max(1))
        .min_idle(Some(min_idle))
        .build(manager)
        .map_err(|e| KbError::StorageError {
            message: format!("failed to open sqlite pool at {}: {e}", path.display()),
        })
}
