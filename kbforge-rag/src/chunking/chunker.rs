//! Sentence-boundary-aware sliding-window chunker: target
//! chunk size 1024 tokens, overlap 200 tokens, split at sentence boundaries
//! when possible.

use kbforge_utils::tokenize::TokenCounter;

/// One chunk of a larger document, prior to metadata enrichment.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub text: String,
    pub token_count: usize,
}

pub struct Chunker {
    tokenizer: Box<dyn TokenCounter>,
    target_tokens: usize,
    overlap_tokens: usize,
}

impl Chunker {
    #[must_use]
    pub fn new(tokenizer: Box<dyn TokenCounter>, target_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            tokenizer,
            target_tokens: target_tokens.max(1),
            overlap_tokens,
        }
    }

    /// Splits `text` into overlapping chunks. Empty input yields zero chunks
    ///, never an error.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<RawChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current_pos = 0;

        while current_pos < text.len() {
            let estimated_end = self.estimate_chunk_end(text, current_pos);
            let chunk_end = Self::find_sentence_boundary(text, current_pos, estimated_end);
            let chunk_text = &text[current_pos..chunk_end];
            if !chunk_text.trim().is_empty() {
                chunks.push(RawChunk {
                    text: chunk_text.to_string(),
                    token_count: self.tokenizer.count_tokens(chunk_text),
                });
            }

            if chunk_end >= text.len() {
                break;
            }

            current_pos = if chunk_end <= current_pos {
                current_pos + 1
            } else {
                self.retreat_for_overlap(text, chunk_end)
            };
        }

        chunks
    }

    fn find_sentence_boundary(text: &str, start: usize, max_pos: usize) -> usize {
        let max_pos = max_pos.min(text.len());
        let search = &text[start..max_pos];
        for (i, ch) in search.char_indices().rev() {
            if matches!(ch, '.' | '!' | '?') {
                let next_pos = start + i + ch.len_utf8();
                if next_pos >= text.len() || text[next_pos..].starts_with(char::is_whitespace) {
                    return next_pos;
                }
            }
        }
        max_pos
    }

    /// Binary search over byte offsets for the position where the token
    /// count first reaches `target_tokens`.
    fn estimate_chunk_end(&self, text: &str, start: usize) -> usize {
        let slice = &text[start..];
        if slice.is_empty() {
            return start;
        }

        let mut left = 0;
        let mut right = slice.len();
        let mut best_end = start + 1;

        while left < right {
            let mid = left + (right - left) / 2;
            let boundary = Self::next_char_boundary(slice, mid);
            if boundary == 0 {
                left = boundary + 1;
                continue;
            }
            let token_count = self.tokenizer.count_tokens(&slice[..boundary]);
            match token_count.cmp(&self.target_tokens) {
                std::cmp::Ordering::Less => {
                    best_end = start + boundary;
                    left = boundary + 1;
                }
                std::cmp::Ordering::Greater => right = boundary.saturating_sub(1),
                std::cmp::Ordering::Equal => return start + boundary,
            }
        }
        best_end.max(start + 1).min(text.len())
    }

    fn next_char_boundary(s: &str, at: usize) -> usize {
        let mut b = at.min(s.len());
        while b < s.len() && !s.is_char_boundary(b) {
            b += 1;
        }
        b
    }

    fn retreat_for_overlap(&self, text: &str, chunk_end: usize) -> usize {
        if self.overlap_tokens == 0 {
            return chunk_end;
        }
        // Binary search backward for a boundary whose token count from there
        // to chunk_end is approximately overlap_tokens.
        let mut left = 0;
        let mut right = chunk_end;
        let mut best = chunk_end;
        while left < right {
            let mid = left + (right - left) / 2;
            let boundary = Self::next_char_boundary(text, mid);
            let token_count = self.tokenizer.count_tokens(&text[boundary..chunk_end]);
            if token_count < self.overlap_tokens {
                best = boundary;
                right = boundary;
            } else {
                left = boundary + 1;
            }
        }
        best.min(chunk_end)
    }
}
