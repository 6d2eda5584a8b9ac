//! ABOUTME: Configuration validation logic
//! ABOUTME: Rejects unsafe or self-contradictory option combinations

use crate::{ConfigError, KbForgeConfig};
use tracing::debug;

/// Validate the entire configuration.
///
/// # Errors
/// Returns [`ConfigError::Validation`] on the first violated constraint.
pub fn validate_config(config: &KbForgeConfig) -> Result<(), ConfigError> {
    debug!("validating configuration");

    validate_chunking(config)?;
    validate_embedding(config)?;
    validate_engine_cache(config)?;
    validate_http(config)?;

    Ok(())
}

fn validate_chunking(config: &KbForgeConfig) -> Result<(), ConfigError> {
    if config.chunking.chunk_overlap_tokens >= config.chunking.chunk_size_tokens {
        return Err(ConfigError::Validation {
            field: "chunking.chunk_overlap_tokens".to_string(),
            message: format!(
                "overlap ({}) must be smaller than chunk size ({})",
                config.chunking.chunk_overlap_tokens, config.chunking.chunk_size_tokens
            ),
        });
    }
    Ok(())
}

fn validate_embedding(config: &KbForgeConfig) -> Result<(), ConfigError> {
    if config.embedding.dimensions == 0 {
        return Err(ConfigError::Validation {
            field: "embedding.dimensions".to_string(),
            message: "embedding dimension must be non-zero".to_string(),
        });
    }
    Ok(())
}

fn validate_engine_cache(config: &KbForgeConfig) -> Result<(), ConfigError> {
    if config.engine_cache.ttl_s == 0 {
        return Err(ConfigError::Validation {
            field: "engine_cache.ttl_s".to_string(),
            message: "TTL must be non-zero".to_string(),
        });
    }
    if config.engine_cache.max_entries == 0 {
        return Err(ConfigError::Validation {
            field: "engine_cache.max_entries".to_string(),
            message: "capacity must be non-zero".to_string(),
        });
    }
    Ok(())
}

fn validate_http(config: &KbForgeConfig) -> Result<(), ConfigError> {
    let wildcard = config.http.allowed_origins.iter().any(|o| o == "*");
    if wildcard && config.profile != "dev" {
        return Err(ConfigError::Validation {
            field: "http.allowed_origins".to_string(),
            message: "wildcard CORS origin is only allowed in the dev profile".to_string(),
        });
    }
    if config.http.storage_pool_min == 0 || config.http.storage_pool_min > config.http.storage_pool_max {
        return Err(ConfigError::Validation {
            field: "http.storage_pool_min".to_string(),
            message: "pool min must be >=1 and <= pool max".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let mut cfg = KbForgeConfig::default();
        cfg.chunking.chunk_size_tokens = 100;
        cfg.chunking.chunk_overlap_tokens = 100;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_wildcard_cors_in_production() {
        let mut cfg = KbForgeConfig::default();
        cfg.profile = "production".to_string();
        cfg.http.allowed_origins = vec!["*".to_string()];
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn allows_wildcard_cors_in_dev() {
        let mut cfg = KbForgeConfig::default();
        cfg.profile = "dev".to_string();
        cfg.http.allowed_origins = vec!["*".to_string()];
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_wildcard_cors_in_test_profile() {
        let mut cfg = KbForgeConfig::default();
        cfg.profile = "test".to_string();
        cfg.http.allowed_origins = vec!["*".to_string()];
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_cache_capacity() {
        let mut cfg = KbForgeConfig::default();
        cfg.engine_cache.max_entries = 0;
        assert!(validate_config(&cfg).is_err());
    }
}
