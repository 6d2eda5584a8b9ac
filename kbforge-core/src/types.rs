//! Core data types: knowledge bases, chunks, and query results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of knowledge base, which drives per-type retrieval defaults.
/// Defaults live in `kbforge-config`, not here — this is a plain tagged
/// variant, never a trait object, since the set of KB types is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KbType {
    Generic,
    Code,
    Documentation,
    AgentOs,
}

impl KbType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Code => "code",
            Self::Documentation => "documentation",
            Self::AgentOs => "agent_os",
        }
    }
}

impl Default for KbType {
    fn default() -> Self {
        Self::Generic
    }
}

impl std::fmt::Display for KbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KbType {
    type Err = crate::error::KbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Self::Generic),
            "code" => Ok(Self::Code),
            "documentation" => Ok(Self::Documentation),
            "agent_os" => Ok(Self::AgentOs),
            other => Err(crate::error::KbError::invalid_input(format!(
                "unknown kb_type '{other}'"
            ))),
        }
    }
}

/// A tenant: owns documents, chunks, and a vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub kb_type: KbType,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub embed_dim: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive a deterministic, URL-safe slug from a display name.
///
/// Rules: lowercase, whitespace/underscore become `-`, strip anything
/// outside `[a-z0-9-]`, collapse repeated `-`, trim leading/trailing `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if ch.is_whitespace() || ch == '_' || ch == '-' {
            out.push('-');
        }
        // everything else is stripped
    }

    let mut collapsed = String::with_capacity(out.len());
    let mut prev_dash = false;
    for ch in out.chars() {
        if ch == '-' {
            if !prev_dash {
                collapsed.push('-');
            }
            prev_dash = true;
        } else {
            collapsed.push(ch);
            prev_dash = false;
        }
    }

    collapsed.trim_matches('-').to_string()
}

/// A bounded text span with an embedding and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub node_id: Option<String>,
    pub embedding: Vec<f32>,
}

impl Chunk {
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.metadata.get("filename").and_then(|v| v.as_str())
    }
}

/// Grouping of chunks sharing a source filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub chunk_count: usize,
}

/// Aggregate counters for a KB's chunk table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A single retrieved/cited source in a query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub score: f32,
}

/// One sub-question and its synthesized answer (agentic mode,).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// The fixed sentence the Synthesizer returns when nothing was retrieved or
/// grounded. Tests compare against this
/// literally — never paraphrase it.
pub const NO_INFORMATION_SENTENCE: &str = "I don't have specific documentation about that.";

/// Full result of a `retrieve` + `synthesize` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_questions: Option<Vec<SubQuestionAnswer>>,
    pub retrieval_ms: u64,
    pub synthesis_ms: u64,
}

impl QueryResult {
    /// Build the canonical "no information" response.
    #[must_use]
    pub fn no_information(retrieval_ms: u64) -> Self {
        Self {
            answer: NO_INFORMATION_SENTENCE.to_string(),
            sources: Vec::new(),
            sub_questions: None,
            retrieval_ms,
            synthesis_ms: 0,
        }
    }
}
