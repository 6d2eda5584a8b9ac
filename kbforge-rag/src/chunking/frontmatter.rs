//! Markdown normalization: frontmatter extraction, ATX heading normalization,
//! blank-line collapsing.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Normalized markdown body plus whatever structured fields the
/// frontmatter/body yielded.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMarkdown {
    pub body: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub frontmatter: Map<String, Value>,
}

/// Strips and parses a leading `---`/`+++` delimited frontmatter block (YAML
/// or TOML respectively), normalizes setext headings to ATX, collapses
/// repeated blank lines, and extracts the first H1 as `title`.
#[must_use]
pub fn normalize(raw: &str) -> NormalizedMarkdown {
    let (frontmatter, body) = split_frontmatter(raw);
    let body = normalize_headings(&body);
    let body = collapse_blank_lines(&body);

    let title = first_h1(&body).or_else(|| {
        frontmatter
            .get("title")
            .and_then(Value::as_str)
            .map(ToString::to_string)
    });

    let tags = frontmatter
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(ToString::to_string)).collect())
        .unwrap_or_default();

    NormalizedMarkdown {
        body,
        title,
        tags,
        frontmatter,
    }
}

fn split_frontmatter(raw: &str) -> (Map<String, Value>, String) {
    let trimmed = raw.trim_start_matches('\u{feff}');

    if let Some(rest) = trimmed.strip_prefix("---\n") {
        if let Some(end) = rest.find("\n---") {
            let yaml_block = &rest[..end];
            let body_start = rest[end..].find('\n').map_or(rest.len(), |n| end + n + 1);
            let body = &rest[body_start..];
            let parsed = serde_yaml::from_str::<Value>(yaml_block)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            return (parsed, body.to_string());
        }
    }

    if let Some(rest) = trimmed.strip_prefix("+++\n") {
        if let Some(end) = rest.find("\n+++") {
            let toml_block = &rest[..end];
            let body_start = rest[end..].find('\n').map_or(rest.len(), |n| end + n + 1);
            let body = &rest[body_start..];
            let parsed = toml::from_str::<toml::Value>(toml_block)
                .ok()
                .and_then(|v| serde_json::to_value(v).ok())
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            return (parsed, body.to_string());
        }
    }

    (Map::new(), trimmed.to_string())
}

fn setext_h1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(.+)\n=+\s*$").unwrap())
}

fn setext_h2_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(.+)\n-+\s*$").unwrap())
}

fn normalize_headings(body: &str) -> String {
    let body = setext_h1_re().replace_all(body, "# $1");
    let body = setext_h2_re().replace_all(&body, "## $1");
    body.into_owned()
}

fn collapse_blank_lines(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut blank_run = 0;
    for line in body.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn first_h1(body: &str) -> Option<String> {
    body.lines()
        .find(|line| line.trim_start().starts_with("# "))
        .map(|line| line.trim_start().trim_start_matches('#').trim().to_string())
}
