pub mod chunker;
pub mod frontmatter;
pub mod tokenizer;

pub use chunker::{Chunker, RawChunk};
pub use frontmatter::{normalize, NormalizedMarkdown};
pub use tokenizer::counter_for_model;
