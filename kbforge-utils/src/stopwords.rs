//! English stopword filtering for lexical (BM25) retrieval.

use std::collections::HashSet;
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "its", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "were", "will", "with", "do", "does", "did", "has", "have",
    "had", "i", "you", "he", "she", "we", "what", "which", "who", "whom", "how", "why", "can",
    "could", "should", "would", "not", "no", "so", "about", "also", "from",
];

fn set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Whether `word` is a common English stopword, compared case-insensitively.
#[must_use]
pub fn is_stopword(word: &str) -> bool {
    set().contains(word.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_common_words() {
        assert!(is_stopword("the"));
        assert!(is_stopword("The"));
        assert!(is_stopword("IS"));
    }

    #[test]
    fn keeps_content_words() {
        assert!(!is_stopword("rust"));
        assert!(!is_stopword("authentication"));
    }
}
