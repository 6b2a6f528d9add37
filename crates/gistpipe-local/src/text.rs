//! Small display-side text helpers.

use regex::Regex;

lazy_static::lazy_static! {
    static ref NEWLINE_RUN_RE: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Collapse 3+ consecutive newlines to exactly two, then trim.
///
/// Applied before text is shown or summarized, never during extraction.
pub fn clean_summary_text(text: &str) -> String {
    NEWLINE_RUN_RE
        .replace_all(text, "\n\n")
        .trim()
        .to_string()
}

/// Prefix of `s` holding at most `max_chars` chars.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Short operator-facing preview: newline runs collapsed, clipped with `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let collapsed = NEWLINE_RUN_RE.replace_all(text, "\n\n");
    let head = truncate_chars(&collapsed, max_chars);
    if head.len() < collapsed.len() {
        format!("{head}...")
    } else {
        head.to_string()
    }
}

/// Rough token estimate (1 token ≈ 4 chars), used for logging only.
pub fn approx_tokens(s: &str) -> usize {
    (s.chars().count() / 4).max(1)
}
