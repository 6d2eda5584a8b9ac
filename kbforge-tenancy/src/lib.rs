//! ABOUTME: The multi-tenancy layer: KB Registry and per-KB Engine Cache
//! ABOUTME: Tracks which knowledge bases exist and caches their live engines

pub mod engine;
pub mod engine_cache;
pub mod registry;

pub use engine::{EngineDeps, KbEngine, SearchOverrides};
pub use engine_cache::{EngineCache, EngineCacheConfig};
pub use registry::KbRegistry;
