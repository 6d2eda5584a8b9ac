//! Table-identifier sanitization for per-KB physical storage.
//!
//! SQL identifiers cannot be parameterized, so every place that builds a
//! table name from a KB-controlled string MUST go through
//! [`sanitize_table_name`] first. This is the only
//! approved path from "string the caller influenced" to "identifier
//! interpolated into SQL".

use kbforge_core::error::KbError;

const MAX_IDENT_LEN: usize = 63;
const PREFIX: &str = "data_";

/// Turn an arbitrary KB slug/name into a safe SQLite table identifier:
/// `data_` prefix, `[a-z0-9_]` only, length-bounded.
///
/// # Errors
/// Returns [`KbError::InvalidInput`] if the input sanitizes to an empty
/// identifier (e.g. all-punctuation input).
pub fn sanitize_table_name(raw: &str) -> Result<String, KbError> {
    let mut body = String::with_capacity(raw.len());
    for ch in raw.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            body.push(ch);
        } else {
            body.push('_');
        }
    }

    let collapsed = collapse_underscores(&body);
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        return Err(KbError::invalid_input(format!(
            "cannot derive a storage identifier from '{raw}'"
        )));
    }

    let mut ident = format!("{PREFIX}{trimmed}");
    ident.truncate(MAX_IDENT_LEN);
    // Truncation could leave a trailing underscore or partial byte boundary
    // (input is ASCII-only at this point, so byte boundaries are safe).
    let ident = ident.trim_end_matches('_').to_string();
    Ok(ident)
}

fn collapse_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = false;
    for ch in s.chars() {
        if ch == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(ch);
            prev_underscore = false;
        }
    }
    out
}
