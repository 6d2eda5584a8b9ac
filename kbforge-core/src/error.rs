//! Canonical error taxonomy shared across the workspace.
//!
//! Every crate boundary eventually converts its local error type into a
//! [`KbError`] variant so the MCP dispatcher and REST layer can map a single
//! taxonomy onto JSON-RPC error codes and HTTP status codes.

use thiserror::Error;

/// Top-level error type for all knowledge-base operations.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("already exists: {message}")]
    AlreadyExists { message: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("unsupported or corrupt document '{filename}': {message}")]
    UnsupportedOrCorrupt { filename: String, message: String },

    #[error("embedder unavailable: {message}")]
    EmbedderUnavailable { message: String },

    #[error("LLM unavailable: {message}")]
    LlmUnavailable { message: String },

    #[error("LLM request timed out after {timeout_s}s")]
    LlmTimeout { timeout_s: u64 },

    #[error("storage error: {message}")]
    StorageError { message: String },

    #[error("rate limited: {message}")]
    RateLimited { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl KbError {
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// JSON-RPC 2.0 error code for this error kind.
    #[must_use]
    pub const fn jsonrpc_code(&self) -> i64 {
        match self {
            Self::NotFound { .. } | Self::AlreadyExists { .. } | Self::InvalidInput { .. } => {
                -32602
            }
            Self::StorageError { .. } | Self::Internal { .. } => -32603,
            Self::UnsupportedOrCorrupt { .. }
            | Self::EmbedderUnavailable { .. }
            | Self::LlmUnavailable { .. }
            | Self::LlmTimeout { .. }
            | Self::RateLimited { .. } => -32603,
        }
    }

    /// HTTP status code for the REST surface.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } => 409,
            Self::InvalidInput { .. } | Self::UnsupportedOrCorrupt { .. } => 400,
            Self::EmbedderUnavailable { .. } => 503,
            Self::LlmUnavailable { .. } | Self::LlmTimeout { .. } => 504,
            Self::StorageError { .. } | Self::Internal { .. } => 500,
            Self::RateLimited { .. } => 429,
        }
    }
}

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KbError>;
