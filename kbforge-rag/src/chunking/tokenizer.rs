//! tiktoken-backed token counting, with the character-estimate fallback from
//! `kbforge-utils` when the model isn't recognized.

use kbforge_utils::tokenize::{CharacterTokenCounter, TokenCounter};
use tiktoken_rs::CoreBPE;

pub struct TiktokenCounter {
    bpe: CoreBPE,
    model: String,
}

impl TiktokenCounter {
    /// # Errors
    /// Returns an error if the BPE data for the resolved encoding can't be loaded.
    pub fn for_model(model: &str) -> Result<Self, anyhow::Error> {
        let bpe = match model {
            "gpt-4" | "gpt-4-turbo" | "gpt-4o" | "text-embedding-3-small" | "text-embedding-3-large" => {
                tiktoken_rs::cl100k_base()?
            }
            "text-davinci-003" | "text-davinci-002" => tiktoken_rs::p50k_base()?,
            "code-davinci-002" | "code-cushman-001" => tiktoken_rs::p50k_edit()?,
            "gpt2" | "gpt-2" => tiktoken_rs::r50k_base()?,
            _ => tiktoken_rs::cl100k_base()?,
        };
        Ok(Self {
            bpe,
            model: model.to_string(),
        })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Resolve a [`TokenCounter`] for `model`, falling back to a character
/// estimate if the tokenizer tables can't be loaded (e.g. offline test runs
/// without the tiktoken data files cached).
#[must_use]
pub fn counter_for_model(model: &str) -> Box<dyn TokenCounter> {
    match TiktokenCounter::for_model(model) {
        Ok(counter) => Box::new(counter),
        Err(e) => {
            tracing::warn!(model, error = %e, "falling back to character token estimate");
            Box::new(CharacterTokenCounter::default_estimate())
        }
    }
}
