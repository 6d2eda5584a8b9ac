//! ABOUTME: Per-KB SQLite-backed VectorStore implementation
//! ABOUTME: One physical table per KB, sanitized via kbforge-utils::identifier

pub mod pool;
pub mod sqlite_store;

pub use pool::{new_pool, SqlitePool};
pub use sqlite_store::SqliteVectorStore;
