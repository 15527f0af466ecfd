//! Last-resort extraction straight from the window text: heading lines
//! become low-confidence proposals, and a short title-like line near the
//! top of the first window becomes the book title.

use super::{Parsed, RawProposal};
use crate::patterns::PatternConfig;
use crate::text::char_len;

const HEURISTIC_CONFIDENCE: f32 = 0.4;
const HEURISTIC_QUALITY: &str = "heuristic";
const TITLE_SCAN_LINES: usize = 10;
const TITLE_MIN_CHARS: usize = 2;
const TITLE_MAX_CHARS: usize = 40;

pub(crate) fn scan(window_text: &str, window_index: usize, patterns: &PatternConfig) -> Parsed {
    let mut proposals = Vec::new();
    let mut offset = 0;

    for line in window_text.split('\n') {
        if let Some((kind, title)) = patterns.match_marker(line) {
            let indent = line.chars().take_while(|c| c.is_whitespace()).count();
            proposals.push(RawProposal {
                kind,
                title,
                position: offset + indent,
                confidence: HEURISTIC_CONFIDENCE,
                quality: HEURISTIC_QUALITY.to_string(),
                reason: Some(format!("Heading line: {}", line.trim())),
            });
        }
        offset += char_len(line) + 1;
    }

    let book_title = if window_index == 0 {
        guess_book_title(window_text, patterns)
    } else {
        None
    };

    Parsed {
        book_title,
        proposals,
        summary: None,
    }
}

fn guess_book_title(text: &str, patterns: &PatternConfig) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(TITLE_SCAN_LINES)
        .find(|line| {
            let len = char_len(line);
            (TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len)
                && !patterns.contains_terminal(line)
                && patterns.match_marker(line).is_none()
        })
        .map(str::to_string)
}
