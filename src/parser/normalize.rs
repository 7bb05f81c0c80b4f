//! Text canonicalization for extracted section content.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s.,;:!?\-()\[\]{}"'/\\]"#).unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());

/// Canonicalize raw extracted text: drop characters outside the allow-list
/// (word characters, whitespace, common punctuation), collapse whitespace
/// runs to single spaces, collapse 3+ blank-line runs to a paragraph break,
/// trim the ends. Idempotent and total.
pub fn normalize(text: &str) -> String {
    let text = DISALLOWED_RE.replace_all(text, "");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}
