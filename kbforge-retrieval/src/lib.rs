//! ABOUTME: Vector/hybrid retrieval, reranking, grounded synthesis, and agentic planning
//! ABOUTME: Combines an Embedder + VectorStore into the query-time half of the pipeline

pub mod agentic;
pub mod fusion;
pub mod lexical;
pub mod rerank;
pub mod retriever;
pub mod synthesis;

pub use agentic::AgenticPlanner;
pub use retriever::{RetrieveOptions, Retriever};
pub use synthesis::{SynthesisResult, Synthesizer};
