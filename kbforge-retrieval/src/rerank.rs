//! Cross-encoder-style reranking of candidate chunks.
//!
//! The cross-encoder itself is swappable behind [`Reranker`]; the
//! implementation here scores relevance via the already-configured
//! `LlmClient` rather than a local neural cross-encoder, since the
//! provider stack is HTTP-based end to end.

use async_trait::async_trait;
use kbforge_core::error::KbError;
use kbforge_core::traits::LlmClient;
use kbforge_core::types::Chunk;
use std::sync::Arc;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Scores each `(question, chunk)` pair, returning scores in the same
    /// order as `candidates`, higher meaning more relevant.
    async fn score(&self, question: &str, candidates: &[Chunk]) -> Result<Vec<f32>, KbError>;
}

const RERANK_SYSTEM_PROMPT: &str = "You are a relevance scorer. Given a question and a passage, \
respond with ONLY a number from 0 to 10 indicating how relevant the passage is to answering the \
question. No explanation, just the number.";

pub struct LlmReranker {
    llm: Arc<dyn LlmClient>,
}

impl LlmReranker {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn parse_score(raw: &str) -> f32 {
        raw.trim()
            .split_whitespace()
            .next()
            .and_then(|tok| tok.parse::<f32>().ok())
            .unwrap_or(0.0)
            .clamp(0.0, 10.0)
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn score(&self, question: &str, candidates: &[Chunk]) -> Result<Vec<f32>, KbError> {
        let mut scores = Vec::with_capacity(candidates.len());
        for chunk in candidates {
            let prompt = format!("Question: {question}\n\nPassage:\n{}", chunk.text);
            let raw = self.llm.complete(RERANK_SYSTEM_PROMPT, &prompt).await?;
            scores.push(Self::parse_score(&raw));
        }
        Ok(scores)
    }
}

const RERANK_SCORE_SCALE: f32 = 10.0;

/// Reorders `candidates` by reranker score, descending, keeping the top
/// `rerank_top_n`. `Reranker::score` judges on a 0-10 scale, which this
/// divides down to `[0, 1]` before reporting so a reranked score stays
/// comparable to `min_score` on the same scale as a vector cosine score.
pub async fn rerank(
    reranker: &dyn Reranker,
    question: &str,
    candidates: Vec<(Chunk, f32)>,
    rerank_top_n: usize,
) -> Result<Vec<(Chunk, f32)>, KbError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let chunks: Vec<Chunk> = candidates.iter().map(|(c, _)| c.clone()).collect();
    let scores = reranker.score(question, &chunks).await?;

    let mut rescored: Vec<(Chunk, f32)> = chunks.into_iter().zip(scores).collect();
    rescored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    rescored.truncate(rerank_top_n);
    for (_, score) in &mut rescored {
        *score = (*score / RERANK_SCORE_SCALE).clamp(0.0, 1.0);
    }
    Ok(rescored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedLlm;

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, KbError> {
            Ok(if user.contains("relevant") { "9".to_string() } else { "1".to_string() })
        }
        fn max_context_tokens(&self) -> usize {
            4096
        }
        fn max_output_tokens(&self) -> usize {
            800
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn chunk(id: i64, text: &str) -> Chunk {
        Chunk {
            id,
            text: text.to_string(),
            metadata: HashMap::new(),
            node_id: None,
            embedding: Vec::new(),
        }
    }

    #[test]
    fn parses_numeric_score_and_clamps() {
        assert_eq!(LlmReranker::parse_score("9"), 9.0);
        assert_eq!(LlmReranker::parse_score("15"), 10.0);
        assert_eq!(LlmReranker::parse_score("not a number"), 0.0);
    }

    #[tokio::test]
    async fn reranks_by_llm_score_descending() {
        let reranker = LlmReranker::new(Arc::new(FixedLlm));
        let candidates = vec![(chunk(1, "irrelevant passage"), 0.5), (chunk(2, "relevant passage"), 0.4)];

        let result = rerank(&reranker, "question", candidates, 10).await.unwrap();
        assert_eq!(result[0].0.id, 2);
    }

    #[tokio::test]
    async fn empty_candidates_short_circuits() {
        let reranker = LlmReranker::new(Arc::new(FixedLlm));
        let result = rerank(&reranker, "question", Vec::new(), 10).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn reported_scores_are_normalized_into_zero_one() {
        let reranker = LlmReranker::new(Arc::new(FixedLlm));
        let candidates = vec![(chunk(1, "irrelevant passage"), 0.5), (chunk(2, "relevant passage"), 0.4)];

        let result = rerank(&reranker, "question", candidates, 10).await.unwrap();
        for (_, score) in &result {
            assert!(*score <= 1.0, "reranked score {score} exceeds 1.0");
        }
        assert_eq!(result[0].1, 0.9);
    }
}
