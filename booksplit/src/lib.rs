//! booksplit - split digitized books into chapters and sections
//!
//! The text is read through overlapping windows, each analyzed by an LLM.
//! Proposed boundaries are consolidated into one non-overlapping segment
//! list, and chunks that start or end mid-sentence are merged or rewritten.

pub mod boundary;
pub mod config;
pub mod document;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod llm;
pub mod patterns;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod segment;
pub mod segmenter;
pub mod text;

pub use boundary::{BoundaryCorrector, BoundaryDetector, BoundaryIssue, IssueKind, RepairSummary};
pub use config::SplitterConfig;
pub use document::Document;
pub use enrich::{EnrichedChunk, Enricher};
pub use error::SplitError;
pub use extract::{ResponseExtractor, Strategy, WindowAnalysis};
pub use llm::LlmClient;
pub use patterns::{PatternConfig, PatternSettings};
pub use pipeline::{Pipeline, SplitOutcome, UNTITLED};
pub use report::Report;
pub use segment::{ConsolidatedSegment, SegmentKind, SegmentProposal, TextChunk};
pub use segmenter::{Segmenter, StructureAnalysis};
