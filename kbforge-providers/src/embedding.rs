//! OpenAI-compatible embedding provider, usable against OpenAI itself or any
//! self-hosted server exposing the same `/embeddings` shape (Ollama, vLLM, ...).

use async_trait::async_trait;
use kbforge_core::error::KbError;
use kbforge_core::traits::Embedder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderConfig;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    config: ProviderConfig,
    dimension: usize,
    client: reqwest::Client,
}

impl HttpEmbedder {
    /// # Errors
    /// Returns [`KbError::Internal`] if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig, dimension: usize) -> Result<Self, KbError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::internal(format!("failed to build embedder http client: {e}")))?;
        Ok(Self {
            config,
            dimension,
            client,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, KbError> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            model: &self.config.model,
            input: text,
        });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| KbError::EmbedderUnavailable {
                message: format!("embedding request to {url} failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(KbError::EmbedderUnavailable {
                message: format!("embedding provider returned status {}", response.status()),
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KbError::EmbedderUnavailable {
                message: format!("malformed embedding response: {e}"),
            })?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| KbError::EmbedderUnavailable {
                message: "embedding response contained no data".to_string(),
            })?
            .embedding;

        if embedding.len() != self.dimension {
            return Err(KbError::EmbedderUnavailable {
                message: format!(
                    "embedder returned {}-dim vector, expected {}",
                    embedding.len(),
                    self.dimension
                ),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
