//! Merge per-window proposals into one ordered segment list.

use log::{debug, warn};
use std::collections::HashSet;

use super::{ConsolidatedSegment, SegmentKind, SegmentProposal, TextChunk};
use crate::config::SplitterConfig;
use crate::document::Document;
use crate::text::{char_len, normalize_whitespace};

/// Result of consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    pub segments: Vec<ConsolidatedSegment>,
    /// True when proposals were abandoned for an equal split
    pub used_fallback: bool,
}

/// Turn all proposals into a segment list covering `[0, doc.len())`.
///
/// Segments are chained: each one ends where the next begins and the last
/// ends at the document end. The first segment always starts at 0 so any
/// preamble stays attached to it.
pub fn consolidate(
    proposals: &[SegmentProposal],
    doc: &Document,
    config: &SplitterConfig,
) -> Consolidation {
    let len = doc.len();

    let mut selected: Vec<&SegmentProposal> = proposals
        .iter()
        .filter(|p| p.confidence > config.confidence_threshold || p.is_good_quality())
        .collect();

    if selected.is_empty() && !proposals.is_empty() {
        warn!(
            "No proposal passed the confidence filter ({}); using all {} proposals",
            config.confidence_threshold,
            proposals.len()
        );
        selected = proposals.iter().collect();
    }

    selected.sort_by_key(|p| p.start);

    let mut seen = HashSet::new();
    let unique: Vec<&SegmentProposal> = selected
        .into_iter()
        .filter(|p| {
            let title = p.title.trim();
            !title.is_empty() && seen.insert(title.to_string())
        })
        .collect();

    debug!(
        "{} proposals, {} after filtering and deduplication",
        proposals.len(),
        unique.len()
    );

    if unique.len() < config.min_segment_count {
        warn!(
            "Only {} usable proposals (minimum {}); splitting into {} equal segments",
            unique.len(),
            config.min_segment_count,
            config.fallback_segments
        );
        return Consolidation {
            segments: equal_segments(len, config.fallback_segments, &config.fallback_titles),
            used_fallback: true,
        };
    }

    let mut segments: Vec<ConsolidatedSegment> = Vec::with_capacity(unique.len());
    for (i, proposal) in unique.iter().enumerate() {
        let start = if segments.is_empty() {
            0
        } else {
            proposal.start.min(len)
        };
        let end = unique
            .get(i + 1)
            .map_or(len, |next| next.start.min(len))
            .max(start);

        if doc.slice(start, end).trim().is_empty() {
            debug!("Dropping empty segment '{}' at {}", proposal.title, start);
            if let Some(previous) = segments.last_mut() {
                previous.end = end;
            }
            continue;
        }

        segments.push(ConsolidatedSegment {
            kind: proposal.kind,
            ordinal: segments.len() + 1,
            title: proposal.title.trim().to_string(),
            start,
            end,
        });
    }

    Consolidation {
        segments,
        used_fallback: false,
    }
}

/// `count` chapters of (nearly) equal length spanning `[0, len)`.
///
/// Titles come from `titles` in order, then `第N章`.
pub fn equal_segments(len: usize, count: usize, titles: &[String]) -> Vec<ConsolidatedSegment> {
    let count = count.max(1);
    (0..count)
        .map(|i| ConsolidatedSegment {
            kind: SegmentKind::Chapter,
            ordinal: i + 1,
            title: titles
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("第{}章", i + 1)),
            start: i * len / count,
            end: (i + 1) * len / count,
        })
        .collect()
}

/// Slice each segment's content out of the document.
pub fn materialize(doc: &Document, segments: &[ConsolidatedSegment]) -> Vec<TextChunk> {
    let mut current_chapter = None;

    segments
        .iter()
        .map(|segment| {
            let parent_chapter = match segment.kind {
                SegmentKind::Chapter => {
                    current_chapter = Some(segment.ordinal);
                    None
                }
                SegmentKind::Section => current_chapter,
            };

            let content = normalize_whitespace(&doc.slice(segment.start, segment.end));
            TextChunk {
                kind: segment.kind,
                ordinal: segment.ordinal,
                title: segment.title.clone(),
                char_count: char_len(&content),
                content,
                start: segment.start,
                end: segment.end,
                parent_chapter,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn proposal(title: &str, start: usize, confidence: f32, quality: &str) -> SegmentProposal {
        SegmentProposal {
            kind: SegmentKind::Chapter,
            title: title.to_string(),
            position_in_window: start,
            start,
            confidence,
            quality: quality.to_string(),
            reason: None,
            window_index: 0,
        }
    }

    fn sample_doc() -> Document {
        Document::new(&"これは本文の一文です。".repeat(20))
    }

    #[test]
    fn test_duplicate_titles_keep_earliest() {
        let doc = sample_doc();
        let proposals = vec![
            proposal("序章", 0, 0.9, "good"),
            proposal("出会い", 150, 0.8, "good"),
            proposal("出会い", 60, 0.8, "good"),
            proposal("別れ", 120, 0.8, "good"),
        ];
        let result = consolidate(&proposals, &doc, &SplitterConfig::default());

        assert!(!result.used_fallback);
        let titles: Vec<_> = result.segments.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["序章", "出会い", "別れ"]);
        assert_eq!(result.segments[1].start, 60);
        assert_eq!(result.segments[1].end, 120);
        assert_eq!(result.segments[2].end, doc.len());
    }

    #[test]
    fn test_low_confidence_kept_when_quality_good() {
        let doc = sample_doc();
        let proposals = vec![
            proposal("一", 0, 0.9, "medium"),
            proposal("二", 50, 0.1, "good"),
            proposal("三", 100, 0.1, "poor"),
            proposal("四", 150, 0.5, "medium"),
        ];
        let result = consolidate(&proposals, &doc, &SplitterConfig::default());
        let titles: Vec<_> = result.segments.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["一", "二", "四"]);
    }

    #[test]
    fn test_filter_falls_back_to_all_proposals() {
        let doc = sample_doc();
        let proposals = vec![
            proposal("一", 0, 0.1, "poor"),
            proposal("二", 50, 0.1, "poor"),
            proposal("三", 100, 0.05, "poor"),
        ];
        let result = consolidate(&proposals, &doc, &SplitterConfig::default());
        assert!(!result.used_fallback);
        assert_eq!(result.segments.len(), 3);
    }

    #[test]
    fn test_too_few_proposals_uses_equal_split() {
        let doc = sample_doc();
        let config = SplitterConfig {
            fallback_titles: vec!["はじめ".to_string(), "なか".to_string()],
            ..SplitterConfig::default()
        };
        let proposals = vec![proposal("一", 0, 0.9, "good"), proposal("二", 80, 0.9, "good")];
        let result = consolidate(&proposals, &doc, &config);

        assert!(result.used_fallback);
        assert_eq!(result.segments.len(), 4);
        let titles: Vec<_> = result.segments.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["はじめ", "なか", "第3章", "第4章"]);
        let lengths: Vec<_> = result.segments.iter().map(|s| s.end - s.start).collect();
        assert_eq!(lengths, vec![55, 55, 55, 55]);

        let chunks = materialize(&doc, &result.segments);
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_first_segment_starts_at_zero() {
        let doc = sample_doc();
        let proposals = vec![
            proposal("一", 30, 0.9, "good"),
            proposal("二", 90, 0.9, "good"),
            proposal("三", 150, 0.9, "good"),
        ];
        let result = consolidate(&proposals, &doc, &SplitterConfig::default());
        assert_eq!(result.segments[0].start, 0);
        assert_eq!(result.segments[0].end, 90);
    }

    #[test]
    fn test_whitespace_segment_absorbed_by_previous() {
        let text = format!("{}\n\n   \n{}", "前半の本文です。".repeat(5), "後半の本文です。".repeat(5));
        let doc = Document::new(&text);
        let gap_start = 40;
        let gap_end = 46;
        assert!(doc.slice(gap_start, gap_end).trim().is_empty());

        let proposals = vec![
            proposal("一", 0, 0.9, "good"),
            proposal("空", gap_start, 0.9, "good"),
            proposal("二", gap_end, 0.9, "good"),
        ];
        let result = consolidate(&proposals, &doc, &SplitterConfig::default());
        let ranges: Vec<_> = result.segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(ranges, vec![(0, gap_end), (gap_end, doc.len())]);
        assert_eq!(result.segments[1].ordinal, 2);
    }

    #[test]
    fn test_materialize_tracks_parent_chapter() {
        let doc = Document::new("第一章 始まり\n本文。\n1.1 節\n詳細。");
        let segments = vec![
            ConsolidatedSegment {
                kind: SegmentKind::Chapter,
                ordinal: 1,
                title: "始まり".to_string(),
                start: 0,
                end: 12,
            },
            ConsolidatedSegment {
                kind: SegmentKind::Section,
                ordinal: 2,
                title: "節".to_string(),
                start: 12,
                end: doc.len(),
            },
        ];
        let chunks = materialize(&doc, &segments);
        assert_eq!(chunks[0].parent_chapter, None);
        assert_eq!(chunks[1].parent_chapter, Some(1));
        assert_eq!(chunks[0].content, "第一章 始まり 本文。");
        assert_eq!(chunks[0].char_count, 11);
    }

    fn strip_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    proptest! {
        #[test]
        fn prop_segments_chain_and_conserve_content(
            text in "[あいう。 \n]{1,300}",
            raw in prop::collection::vec((0usize..300, 0usize..6, 0.0f32..1.0), 0..12),
        ) {
            let doc = Document::new(&text);
            prop_assume!(!text.trim().is_empty());

            let proposals: Vec<_> = raw
                .iter()
                .map(|&(start, title, confidence)| {
                    proposal(&format!("t{title}"), start.min(doc.len()), confidence, "medium")
                })
                .collect();
            let result = consolidate(&proposals, &doc, &SplitterConfig::default());
            let segments = &result.segments;

            prop_assert!(!segments.is_empty());
            prop_assert_eq!(segments[0].start, 0);
            prop_assert_eq!(segments.last().map(|s| s.end), Some(doc.len()));
            for pair in segments.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }

            let chunks = materialize(&doc, segments);
            let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
            prop_assert_eq!(strip_whitespace(&joined), strip_whitespace(&text));
        }
    }
}
