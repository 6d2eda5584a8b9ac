//! Grounded answer synthesis over retrieved candidates.

use kbforge_core::error::KbError;
use kbforge_core::traits::LlmClient;
use kbforge_core::types::{Chunk, SourceEntry, NO_INFORMATION_SENTENCE};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You answer ONLY from the provided context. \
If the context does not contain the answer, respond with exactly this sentence and nothing else: \
\"I don't have specific documentation about that.\" \
Never invent filenames, APIs, configuration keys, or features not present in the context. \
Cite sources by filename when your answer draws on a specific passage.";

pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
}

pub struct SynthesisResult {
    pub answer: String,
    pub sources: Vec<SourceEntry>,
}

impl Synthesizer {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Synthesizes an answer from `candidates`. An empty candidate list
    /// short-circuits to the canonical "no information" sentence without an
    /// LLM call.
    ///
    /// # Errors
    /// Propagates [`KbError::LlmUnavailable`] or [`KbError::LlmTimeout`].
    pub async fn synthesize(&self, question: &str, candidates: &[(Chunk, f32)]) -> Result<SynthesisResult, KbError> {
        if candidates.is_empty() {
            return Ok(SynthesisResult {
                answer: NO_INFORMATION_SENTENCE.to_string(),
                sources: Vec::new(),
            });
        }

        let user_prompt = Self::assemble_prompt(question, candidates);
        let answer = self.llm.complete(SYSTEM_PROMPT, &user_prompt).await?;

        let sources = candidates
            .iter()
            .map(|(chunk, score)| SourceEntry {
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                score: *score,
            })
            .collect();

        Ok(SynthesisResult { answer, sources })
    }

    fn assemble_prompt(question: &str, candidates: &[(Chunk, f32)]) -> String {
        let mut prompt = String::from("Context:\n\n");
        for (chunk, _score) in candidates {
            let filename = chunk.filename().unwrap_or("unknown");
            prompt.push_str(&format!("[source: {filename}]\n{}\n\n", chunk.text));
        }
        prompt.push_str(&format!("Question: {question}"));
        prompt
    }
}
