//! Text helpers shared by the pipeline stages.

/// Characters that carry no text and only confuse offset bookkeeping.
const INVISIBLE_CHARS: &[char] = &[
    '\u{200b}', // Zero-width space
    '\u{200c}', // Zero-width non-joiner
    '\u{200d}', // Zero-width joiner
    '\u{feff}', // BOM
];

/// Prepare raw file contents for use as a document.
///
/// Normalizes line endings and drops invisible and control characters
/// (newlines and tabs are kept). Runs of whitespace are left alone so
/// blank lines still mark paragraph breaks.
pub fn clean_input(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    text.chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .collect()
}

/// Collapse every whitespace run (including newlines and ideographic
/// spaces) to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `n` characters of `text`.
pub fn head_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Last `n` characters of `text`.
pub fn tail_chars(text: &str, n: usize) -> String {
    let len = char_len(text);
    text.chars().skip(len.saturating_sub(n)).collect()
}

/// A cheap summary: the first paragraph, cut at `max_chars` with an
/// ellipsis marker when longer.
pub fn local_summary(text: &str, max_chars: usize) -> String {
    let first = text.split("\n\n").next().unwrap_or("").trim();
    if char_len(first) <= max_chars {
        first.to_string()
    } else {
        format!("{}...", head_chars(first, max_chars))
    }
}
