//! Text extraction from raw uploaded bytes.

use kbforge_core::error::KbError;

use crate::chunking::frontmatter;

/// Extracted document text plus whatever structured metadata the extractor
/// could pull out (markdown frontmatter `title`/`tags`/other fields).
pub struct ExtractedDocument {
    pub text: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub extra_metadata: serde_json::Map<String, serde_json::Value>,
}

/// Extracts text from `bytes` based on `filename`'s extension and `mime_hint`.
///
/// # Errors
/// Returns [`KbError::UnsupportedOrCorrupt`] if the bytes cannot be decoded
/// as the inferred format.
pub fn extract(filename: &str, mime_hint: Option<&str>, bytes: &[u8]) -> Result<ExtractedDocument, KbError> {
    let lower = filename.to_lowercase();
    let is_pdf = lower.ends_with(".pdf") || mime_hint == Some("application/pdf");
    let is_markdown = lower.ends_with(".md") || lower.ends_with(".markdown") || mime_hint == Some("text/markdown");

    if is_pdf {
        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| KbError::UnsupportedOrCorrupt {
            filename: filename.to_string(),
            message: format!("failed to extract PDF text: {e}"),
        })?;
        return Ok(ExtractedDocument {
            text,
            title: None,
            tags: Vec::new(),
            extra_metadata: serde_json::Map::new(),
        });
    }

    let raw = String::from_utf8_lossy(bytes).into_owned();

    if is_markdown {
        let normalized = frontmatter::normalize(&raw);
        return Ok(ExtractedDocument {
            text: normalized.body,
            title: normalized.title,
            tags: normalized.tags,
            extra_metadata: normalized.frontmatter,
        });
    }

    Ok(ExtractedDocument {
        text: raw,
        title: None,
        tags: Vec::new(),
        extra_metadata: serde_json::Map::new(),
    })
}
