//! Provider connection configuration, loadable from environment variables.

use serde::{Deserialize, Serialize};

/// Connection details for a single embedding or LLM provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            timeout_secs: 30,
        }
    }

    /// Loads `base_url`/`api_key`/`model`/`timeout_secs` from
    /// `KBFORGE_{NAME}_*` environment variables, falling back to `defaults`
    /// for anything unset.
    #[must_use]
    pub fn from_env(name: &str, defaults: &Self) -> Self {
        let prefix = format!("KBFORGE_{}_", name.to_uppercase());
        Self {
            name: name.to_string(),
            base_url: std::env::var(format!("{prefix}BASE_URL")).unwrap_or_else(|_| defaults.base_url.clone()),
            api_key: std::env::var(format!("{prefix}API_KEY")).ok().or_else(|| defaults.api_key.clone()),
            model: std::env::var(format!("{prefix}MODEL")).unwrap_or_else(|_| defaults.model.clone()),
            timeout_secs: std::env::var(format!("{prefix}TIMEOUT_SECS"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}
