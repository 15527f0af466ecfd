//! Surface checks for chunks that start or end mid-sentence.

use super::{
    BoundaryIssue, FRAGMENT_CONFIDENCE, INCOMPLETE_END_CONFIDENCE,
    INCOMPLETE_START_LOWERCASE_CONFIDENCE, INCOMPLETE_START_PARTICLE_CONFIDENCE, IssueKind,
};
use crate::patterns::PatternConfig;
use crate::segment::TextChunk;
use crate::text::{char_len, head_chars, tail_chars};

pub struct BoundaryDetector<'a> {
    patterns: &'a PatternConfig,
    fragment_min_chars: usize,
}

impl<'a> BoundaryDetector<'a> {
    pub fn new(patterns: &'a PatternConfig, fragment_min_chars: usize) -> Self {
        Self {
            patterns,
            fragment_min_chars,
        }
    }

    /// Every issue of every chunk, in chunk order.
    pub fn detect(&self, chunks: &[TextChunk]) -> Vec<BoundaryIssue> {
        chunks
            .iter()
            .enumerate()
            .flat_map(|(index, chunk)| self.inspect(index, &chunk.content))
            .collect()
    }

    /// All issues of a single chunk. Checks are independent; one chunk can
    /// raise several.
    pub fn inspect(&self, index: usize, content: &str) -> Vec<BoundaryIssue> {
        let content = content.trim();
        let mut issues = Vec::new();

        if self.patterns.starts_with_particle(content) {
            issues.push(BoundaryIssue {
                chunk_index: index,
                kind: IssueKind::IncompleteStart,
                confidence: INCOMPLETE_START_PARTICLE_CONFIDENCE,
                description: format!("Starts with a connective: {}", head_chars(content, 10)),
            });
        }

        if self.patterns.starts_lowercase_latin(content) {
            issues.push(BoundaryIssue {
                chunk_index: index,
                kind: IssueKind::IncompleteStart,
                confidence: INCOMPLETE_START_LOWERCASE_CONFIDENCE,
                description: format!("Starts in lowercase: {}", head_chars(content, 10)),
            });
        }

        let last_line = content.lines().last().unwrap_or("");
        if !self.patterns.ends_with_terminal(last_line) {
            issues.push(BoundaryIssue {
                chunk_index: index,
                kind: IssueKind::IncompleteEnd,
                confidence: INCOMPLETE_END_CONFIDENCE,
                description: format!("No terminal punctuation: ...{}", tail_chars(content, 10)),
            });
        }

        let len = char_len(content);
        if len < self.fragment_min_chars {
            issues.push(BoundaryIssue {
                chunk_index: index,
                kind: IssueKind::Fragment,
                confidence: FRAGMENT_CONFIDENCE,
                description: format!("Only {len} characters"),
            });
        }

        issues
    }

    /// Whether a chunk can stand on its own: no incomplete start, at least
    /// one sentence terminal, and at least `min_chars` characters.
    pub fn is_complete(&self, content: &str, min_chars: usize) -> bool {
        let content = content.trim();
        !self.patterns.starts_with_particle(content)
            && !self.patterns.starts_lowercase_latin(content)
            && self.patterns.contains_terminal(content)
            && char_len(content) >= min_chars
    }
}
