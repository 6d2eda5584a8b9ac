//! Token-counting seam used by the chunker and BM25 tokenizer. Kept
//! dependency-light here; the precise tiktoken-backed implementation
//! lives in `kbforge-rag::chunking::tokenizer`.

/// Anything that can estimate how many LLM tokens a string costs.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
    fn name(&self) -> &str;
}

/// Fallback counter: ~4 characters per token, used when no real tokenizer
/// is configured or the real one fails to load.
#[derive(Debug, Default)]
pub struct CharacterTokenCounter {
    chars_per_token: usize,
}

impl CharacterTokenCounter {
    #[must_use]
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    #[must_use]
    pub fn default_estimate() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for CharacterTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.len() / self.chars_per_token
    }

    fn name(&self) -> &str {
        "character_estimate"
    }
}

/// Split `text` into whitespace/punctuation-delimited lowercase tokens,
/// used by BM25 lexical scoring.
#[must_use]
pub fn lexical_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(std::string::ToString::to_string)
        .collect()
}
