//! Segment types and the window/consolidation stages that produce them.

mod consolidate;
mod window;

pub use consolidate::{Consolidation, consolidate, equal_segments, materialize};
pub use window::{Window, Windows, window_end, windows};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::char_len;

/// Separator used whenever two chunks are joined.
pub const MERGE_SEPARATOR: &str = "\n\n";

/// Structural level of a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    #[default]
    Chapter,
    Section,
}

impl SegmentKind {
    /// Parse a type label as written by the collaborator. Unknown labels
    /// yield `None` so callers can apply their own default.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'')
            .to_lowercase();
        match label.as_str() {
            "chapter" | "章" | "chap" => Some(Self::Chapter),
            "section" | "節" | "sect" | "subsection" => Some(Self::Section),
            _ => None,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chapter => write!(f, "chapter"),
            Self::Section => write!(f, "section"),
        }
    }
}

/// A candidate boundary suggested for one window.
///
/// `start` is already an absolute document offset; `position_in_window`
/// keeps the offset as reported.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentProposal {
    pub kind: SegmentKind,
    pub title: String,
    pub position_in_window: usize,
    pub start: usize,
    pub confidence: f32,
    pub quality: String,
    pub reason: Option<String>,
    pub window_index: usize,
}

impl SegmentProposal {
    pub fn is_good_quality(&self) -> bool {
        self.quality.to_lowercase().contains("good")
    }
}

/// A boundary decision spanning `[start, end)` of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedSegment {
    pub kind: SegmentKind,
    pub ordinal: usize,
    pub title: String,
    pub start: usize,
    pub end: usize,
}

/// Materialized content of one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextChunk {
    pub kind: SegmentKind,
    pub ordinal: usize,
    pub title: String,
    pub content: String,
    pub start: usize,
    pub end: usize,
    /// Ordinal of the chapter a section belongs to
    pub parent_chapter: Option<usize>,
    pub char_count: usize,
}

impl TextChunk {
    /// Append the following chunk's content and take over its end offset.
    pub fn absorb_next(&mut self, next: TextChunk) {
        self.content = join_content(&self.content, &next.content);
        self.end = self.end.max(next.end);
        self.char_count = char_len(&self.content);
    }

    /// Prepend the preceding chunk's content and take over its start offset.
    pub fn absorb_previous(&mut self, previous: TextChunk) {
        self.content = join_content(&previous.content, &self.content);
        self.start = self.start.min(previous.start);
        self.char_count = char_len(&self.content);
    }

    /// Replace the content, keeping offsets.
    pub fn set_content(&mut self, content: String) {
        self.char_count = char_len(&content);
        self.content = content;
    }
}

fn join_content(first: &str, second: &str) -> String {
    let first = first.trim_end();
    let second = second.trim_start();
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first}{MERGE_SEPARATOR}{second}"),
    }
}

#[cfg(test)]
pub(crate) fn chunk(ordinal: usize, content: &str, start: usize, end: usize) -> TextChunk {
    TextChunk {
        kind: SegmentKind::Chapter,
        ordinal,
        title: format!("第{ordinal}章"),
        content: content.to_string(),
        start,
        end,
        parent_chapter: None,
        char_count: char_len(content),
    }
}
