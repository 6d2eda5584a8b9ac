//! ABOUTME: Chunking, extraction, embedding cache, and ingestion pipeline
//! ABOUTME: Orchestrates the path from raw uploaded bytes to persisted, embedded chunks

pub mod chunking;
pub mod embeddings;
pub mod extract;
pub mod ingest;

pub use extract::{extract, ExtractedDocument};
pub use ingest::{IngestResult, Ingestor, RetryConfig};
