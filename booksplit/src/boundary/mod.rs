//! Boundary checks and repairs on materialized chunks.

mod corrector;
mod detector;

pub use corrector::{BoundaryCorrector, CorrectionOutcome};
pub use detector::BoundaryDetector;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::segment::TextChunk;

pub const INCOMPLETE_START_PARTICLE_CONFIDENCE: f32 = 0.9;
pub const INCOMPLETE_START_LOWERCASE_CONFIDENCE: f32 = 0.7;
pub const INCOMPLETE_END_CONFIDENCE: f32 = 0.8;
pub const FRAGMENT_CONFIDENCE: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    IncompleteStart,
    IncompleteEnd,
    Fragment,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteStart => write!(f, "incomplete_start"),
            Self::IncompleteEnd => write!(f, "incomplete_end"),
            Self::Fragment => write!(f, "fragment"),
        }
    }
}

/// A defect found at one chunk boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryIssue {
    pub chunk_index: usize,
    pub kind: IssueKind,
    pub confidence: f32,
    pub description: String,
}

/// Text handed to a rewrite: the chunk and the neighboring context.
#[derive(Debug, Clone, Copy)]
pub struct RewriteRequest<'a> {
    /// Tail of the previous chunk
    pub before: &'a str,
    pub chunk: &'a str,
    /// Head of the following chunk
    pub after: &'a str,
}

/// Something able to rewrite a chunk so that it ends cleanly.
#[async_trait]
pub trait BoundaryRewriter: Send + Sync {
    async fn rewrite(&self, request: RewriteRequest<'_>) -> anyhow::Result<String>;
}

/// Counts reported after boundary repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairSummary {
    pub original_count: usize,
    pub final_count: usize,
    /// Chunks absorbed into a neighbor
    pub merged_count: usize,
    pub total_content_length: usize,
    pub average_chunk_length: f64,
    pub rewritten_count: usize,
}

impl RepairSummary {
    pub fn new(original_count: usize, chunks: &[TextChunk], rewritten_count: usize) -> Self {
        let total_content_length: usize = chunks.iter().map(|c| c.char_count).sum();
        let average_chunk_length = if chunks.is_empty() {
            0.0
        } else {
            total_content_length as f64 / chunks.len() as f64
        };

        Self {
            original_count,
            final_count: chunks.len(),
            merged_count: original_count.saturating_sub(chunks.len()),
            total_content_length,
            average_chunk_length,
            rewritten_count,
        }
    }
}
