//! BM25 lexical scoring over a KB's chunks, used by the hybrid retrieval path.

use kbforge_core::types::Chunk;
use kbforge_utils::stopwords::is_stopword;
use kbforge_utils::tokenize::lexical_tokens;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

pub struct Bm25Scorer {
    config: Bm25Config,
}

impl Bm25Scorer {
    #[must_use]
    pub fn new(config: Bm25Config) -> Self {
        Self { config }
    }

    fn tokenize(text: &str) -> Vec<String> {
        lexical_tokens(text).into_iter().filter(|t| !is_stopword(t)).collect()
    }

    fn document_frequency(doc_tokens: &[Vec<String>], terms: &[String]) -> HashMap<String, usize> {
        let mut df: HashMap<String, usize> = HashMap::new();
        for tokens in doc_tokens {
            let mut seen = std::collections::HashSet::new();
            for token in tokens {
                if terms.contains(token) && seen.insert(token.clone()) {
                    *df.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }
        df
    }

    #[allow(clippy::cast_precision_loss)]
    fn idf(n: usize, df: usize) -> f32 {
        let n = n as f32;
        let df = df as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    #[allow(clippy::cast_precision_loss)]
    fn score_document(&self, doc_tokens: &[String], query_terms: &[String], idf: &HashMap<String, f32>, avg_doc_len: f32) -> f32 {
        let doc_len = doc_tokens.len() as f32;
        let k1 = self.config.k1;
        let b = self.config.b;

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for token in doc_tokens {
            *term_freq.entry(token.as_str()).or_insert(0) += 1;
        }

        query_terms
            .iter()
            .map(|term| {
                let tf = term_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
                let idf_score = idf.get(term).copied().unwrap_or(0.0);
                let denominator = tf + k1 * (1.0 - b + b * doc_len / avg_doc_len);
                if denominator == 0.0 {
                    0.0
                } else {
                    idf_score * (tf * (k1 + 1.0)) / denominator
                }
            })
            .sum()
    }

    /// Ranks `chunks` against `query` by BM25 score, descending, zero-score
    /// chunks excluded. Returns `(index into chunks, score)` pairs.
    #[must_use]
    pub fn rank(&self, query: &str, chunks: &[Chunk]) -> Vec<(usize, f32)> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let doc_tokens: Vec<Vec<String>> = chunks.iter().map(|c| Self::tokenize(&c.text)).collect();
        let df = Self::document_frequency(&doc_tokens, &query_terms);
        let idf: HashMap<String, f32> = query_terms
            .iter()
            .map(|t| (t.clone(), Self::idf(chunks.len(), df.get(t).copied().unwrap_or(0))))
            .collect();

        let avg_doc_len = doc_tokens.iter().map(Vec::len).sum::<usize>() as f32 / doc_tokens.len() as f32;

        let mut scored: Vec<(usize, f32)> = doc_tokens
            .iter()
            .enumerate()
            .map(|(idx, tokens)| (idx, self.score_document(tokens, &query_terms, &idf, avg_doc_len)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Self::new(Bm25Config::default())
    }
}
