//! Sub-question decomposition and fusion for `agent_os` KBs.

use kbforge_core::error::KbError;
use kbforge_core::traits::LlmClient;
use kbforge_core::types::{QueryResult, SourceEntry, SubQuestionAnswer};
use std::sync::Arc;

use crate::retriever::{RetrieveOptions, Retriever};
use crate::synthesis::Synthesizer;

const PLANNER_SYSTEM_PROMPT: &str = "Decompose the user's question into 2 to 5 sub-questions that, \
together, cover everything needed to answer it fully. Respond with ONLY the sub-questions, one per \
line, no numbering, no commentary.";

const FUSION_SYSTEM_PROMPT: &str = "You answer ONLY from the provided sub-question answers. \
If none of them contain the answer, respond with exactly this sentence and nothing else: \
\"I don't have specific documentation about that.\" \
Never invent filenames, APIs, configuration keys, or features not present in the context.";

pub struct AgenticPlanner {
    llm: Arc<dyn LlmClient>,
    retriever: Retriever,
    synthesizer: Synthesizer,
}

impl AgenticPlanner {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, retriever: Retriever, synthesizer: Synthesizer) -> Self {
        Self {
            llm,
            retriever,
            synthesizer,
        }
    }

    /// Runs the full agentic pipeline: decompose → per-sub-question
    /// retrieve+synthesize → fuse. Parse failures on the planner's output
    /// fall back to treating the original question as the sole sub-question.
    ///
    /// # Errors
    /// Propagates LLM or retrieval errors from any stage.
    pub async fn plan_and_answer(
        &self,
        question: &str,
        opts: &RetrieveOptions,
        retrieval_ms: u64,
    ) -> Result<QueryResult, KbError> {
        let sub_questions = self.decompose(question).await;

        let mut sub_answers = Vec::with_capacity(sub_questions.len());
        let mut unioned_sources: Vec<SourceEntry> = Vec::new();

        for sub_question in &sub_questions {
            let candidates = self.retriever.retrieve(sub_question, opts).await?;
            let result = self.synthesizer.synthesize(sub_question, &candidates).await?;
            unioned_sources.extend(result.sources.clone());
            sub_answers.push(SubQuestionAnswer {
                question: sub_question.clone(),
                answer: result.answer,
            });
        }

        let fused_answer = self.fuse(question, &sub_answers).await?;

        Ok(QueryResult {
            answer: fused_answer,
            sources: unioned_sources,
            sub_questions: Some(sub_answers),
            retrieval_ms,
            synthesis_ms: 0,
        })
    }

    async fn decompose(&self, question: &str) -> Vec<String> {
        match self.llm.complete(PLANNER_SYSTEM_PROMPT, question).await {
            Ok(raw) => {
                let parsed: Vec<String> = raw
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(std::string::ToString::to_string)
                    .collect();
                if (2..=5).contains(&parsed.len()) {
                    parsed
                } else {
                    vec![question.to_string()]
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "planner decomposition failed, falling back to original question");
                vec![question.to_string()]
            }
        }
    }

    async fn fuse(&self, question: &str, sub_answers: &[SubQuestionAnswer]) -> Result<String, KbError> {
        let mut prompt = String::from("Sub-question answers:\n\n");
        for sub_answer in sub_answers {
            prompt.push_str(&format!("Q: {}\nA: {}\n\n", sub_answer.question, sub_answer.answer));
        }
        prompt.push_str(&format!("Original question: {question}"));

        self.llm.complete(FUSION_SYSTEM_PROMPT, &prompt).await
    }
}
