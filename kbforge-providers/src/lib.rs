//! ABOUTME: HTTP provider implementations for the Embedder and LlmClient seams
//! ABOUTME: OpenAI-compatible wire format, works against hosted or self-hosted servers

pub mod config;
pub mod embedding;
pub mod llm;

pub use config::ProviderConfig;
pub use embedding::HttpEmbedder;
pub use llm::HttpLlmClient;
