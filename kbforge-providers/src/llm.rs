//! OpenAI-compatible chat-completion client, grounded against the same
//! `/chat/completions` shape most self-hosted and hosted providers share.

use async_trait::async_trait;
use kbforge_core::error::KbError;
use kbforge_core::traits::LlmClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderConfig;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct HttpLlmClient {
    config: ProviderConfig,
    temperature: f32,
    max_context_tokens: usize,
    max_output_tokens: usize,
    client: reqwest::Client,
}

impl HttpLlmClient {
    /// # Errors
    /// Returns [`KbError::Internal`] if the HTTP client cannot be built.
    pub fn new(
        config: ProviderConfig,
        temperature: f32,
        max_context_tokens: usize,
        max_output_tokens: usize,
    ) -> Result<Self, KbError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::internal(format!("failed to build llm http client: {e}")))?;
        Ok(Self {
            config,
            temperature,
            max_context_tokens,
            max_output_tokens,
            client,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, KbError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_output_tokens,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                KbError::LlmTimeout {
                    timeout_s: self.config.timeout_secs,
                }
            } else {
                KbError::LlmUnavailable {
                    message: format!("completion request to {url} failed: {e}"),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(KbError::LlmUnavailable {
                message: format!("llm provider returned status {}", response.status()),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| KbError::LlmUnavailable {
            message: format!("malformed completion response: {e}"),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| KbError::LlmUnavailable {
                message: "completion response contained no choices".to_string(),
            })
    }

    fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    fn max_output_tokens(&self) -> usize {
        self.max_output_tokens
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_configured_limits() {
        let config = ProviderConfig::new("llm", "http://localhost:1", "test-model");
        let client = HttpLlmClient::new(config, 0.2, 4096, 800).unwrap();
        assert_eq!(client.max_context_tokens(), 4096);
        assert_eq!(client.max_output_tokens(), 800);
        assert_eq!(client.model_name(), "test-model");
    }
}
