//! Turn a collaborator reply into typed segment proposals.
//!
//! Replies are parsed by an ordered ladder of strategies. Each strategy
//! returns a possibly empty [`Parsed`] value; the next one is only tried
//! when the previous produced no proposals. Extraction never fails: the
//! worst case is an empty analysis, which the consolidator turns into an
//! equal split.

mod heuristic;
mod legacy;
mod tagged;

use log::{debug, info};
use serde::Serialize;

use crate::patterns::PatternConfig;
use crate::segment::{SegmentKind, SegmentProposal, Window};

pub const DEFAULT_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_QUALITY: &str = "medium";

/// Which strategy produced the proposals of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TaggedBlocks,
    LegacyObject,
    KeywordHeuristic,
    Empty,
}

impl Strategy {
    const LADDER: [Strategy; 3] = [
        Strategy::TaggedBlocks,
        Strategy::LegacyObject,
        Strategy::KeywordHeuristic,
    ];
}

/// Everything extracted for one window, in document coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAnalysis {
    pub book_title: Option<String>,
    pub proposals: Vec<SegmentProposal>,
    pub content_summary: String,
    pub strategy: Strategy,
}

/// A proposal as written in the reply, before position translation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawProposal {
    pub kind: SegmentKind,
    pub title: String,
    pub position: usize,
    pub confidence: f32,
    pub quality: String,
    pub reason: Option<String>,
}

/// Output of a single strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Parsed {
    pub book_title: Option<String>,
    pub proposals: Vec<RawProposal>,
    pub summary: Option<String>,
}

pub struct ResponseExtractor<'a> {
    patterns: &'a PatternConfig,
}

impl<'a> ResponseExtractor<'a> {
    pub fn new(patterns: &'a PatternConfig) -> Self {
        Self { patterns }
    }

    /// Extract proposals from `response`, the reply for `window`.
    ///
    /// `window_text` is the text that was analyzed; the keyword heuristic
    /// scans it when the reply itself is unusable.
    pub fn extract(&self, response: &str, window: &Window, window_text: &str) -> WindowAnalysis {
        let mut book_title = None;
        let mut summary = None;

        for strategy in Strategy::LADDER {
            let parsed = self.apply(strategy, response, window, window_text);
            if book_title.is_none() {
                book_title = parsed.book_title;
            }
            if summary.is_none() {
                summary = parsed.summary;
            }

            if !parsed.proposals.is_empty() {
                debug!(
                    "Window {}: {} proposals via {:?}",
                    window.index,
                    parsed.proposals.len(),
                    strategy
                );
                return WindowAnalysis {
                    book_title,
                    proposals: translate(parsed.proposals, window),
                    content_summary: summary.unwrap_or_default(),
                    strategy,
                };
            }

            info!(
                "Window {}: {:?} found no segments, trying next strategy",
                window.index, strategy
            );
        }

        WindowAnalysis {
            book_title,
            proposals: Vec::new(),
            content_summary: summary.unwrap_or_default(),
            strategy: Strategy::Empty,
        }
    }

    fn apply(&self, strategy: Strategy, response: &str, window: &Window, window_text: &str) -> Parsed {
        match strategy {
            Strategy::TaggedBlocks => tagged::parse(response),
            Strategy::LegacyObject => legacy::parse(response),
            Strategy::KeywordHeuristic => heuristic::scan(window_text, window.index, self.patterns),
            Strategy::Empty => Parsed::default(),
        }
    }
}

/// Convert window-relative positions into document offsets. Positions past
/// the window end are clamped to it.
fn translate(proposals: Vec<RawProposal>, window: &Window) -> Vec<SegmentProposal> {
    proposals
        .into_iter()
        .map(|raw| {
            let position = raw.position.min(window.len());
            SegmentProposal {
                kind: raw.kind,
                title: raw.title,
                position_in_window: position,
                start: window.start + position,
                confidence: raw.confidence,
                quality: raw.quality,
                reason: raw.reason,
                window_index: window.index,
            }
        })
        .collect()
}

/// First unsigned integer in `value`, accepting full-width digits.
pub(crate) fn parse_position(value: &str) -> Option<usize> {
    let digits: String = value
        .chars()
        .map(to_ascii_digit)
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Confidence from text such as `0.85`, `.9`, `85%`, `8/10` or
/// `high (0.7)`. The result is within `[0, 1]`.
pub(crate) fn parse_confidence(value: &str) -> Option<f32> {
    let normalized: String = value.chars().map(to_ascii_digit).collect();
    let start = normalized.find(|c: char| c.is_ascii_digit() || c == '.')?;
    let (number, rest) = leading_number(&normalized[start..])?;
    let rest = rest.trim_start();

    if let Some(denominator) = rest.strip_prefix(['/', '／']) {
        if let Some((denominator, _)) = leading_number(denominator.trim_start()) {
            if denominator > 0.0 {
                return Some(normalize_confidence(number / denominator));
            }
        }
    }
    if rest.starts_with(['%', '％']) {
        return Some((number / 100.0).clamp(0.0, 1.0));
    }
    Some(normalize_confidence(number))
}

fn leading_number(text: &str) -> Option<(f32, &str)> {
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let parsed = text[..end].trim_end_matches('.').parse().ok()?;
    Some((parsed, &text[end..]))
}

/// Bare numbers of 10 or more are percentages; anything else above 1 is
/// clamped.
pub(crate) fn normalize_confidence(value: f32) -> f32 {
    if !value.is_finite() {
        DEFAULT_CONFIDENCE
    } else if value >= 10.0 {
        (value / 100.0).min(1.0)
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Strip surrounding quotes and brackets from a title value.
pub(crate) fn clean_title(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '「' | '」' | '『' | '』' | '“' | '”'))
        .trim()
        .to_string()
}

/// A book title, unless the value is a placeholder for "no title".
pub(crate) fn book_title_value(value: &str) -> Option<String> {
    let title = clean_title(value);
    let lowered = title.to_lowercase();
    let placeholder = matches!(
        lowered.as_str(),
        "" | "-" | "none" | "null" | "n/a" | "na" | "unknown" | "なし" | "不明" | "タイトル未設定"
    );
    (!placeholder).then_some(title)
}

fn to_ascii_digit(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        '．' => '.',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(index: usize, start: usize, end: usize) -> Window {
        Window { index, start, end }
    }

    #[test]
    fn test_tagged_reply_translates_positions() {
        let patterns = PatternConfig::default();
        let extractor = ResponseExtractor::new(&patterns);
        let reply = "SEGMENTS:\n[SEGMENT_START]\nTYPE: section\nTITLE: 出会い\nPOSITION: 120\nCONFIDENCE: 0.8\nQUALITY: good\n[SEGMENT_END]\nSUMMARY: 二人が出会う。";

        let analysis = extractor.extract(reply, &window(2, 5000, 8000), "");
        assert_eq!(analysis.strategy, Strategy::TaggedBlocks);
        assert_eq!(analysis.content_summary, "二人が出会う。");
        assert_eq!(analysis.proposals.len(), 1);
        let proposal = &analysis.proposals[0];
        assert_eq!(proposal.start, 5120);
        assert_eq!(proposal.position_in_window, 120);
        assert_eq!(proposal.window_index, 2);
        assert_eq!(proposal.kind, SegmentKind::Section);
    }

    #[test]
    fn test_position_clamped_to_window() {
        let patterns = PatternConfig::default();
        let extractor = ResponseExtractor::new(&patterns);
        let reply = "[SEGMENT_START]\nTITLE: 終章\nPOSITION: 99999\n[SEGMENT_END]";
        let analysis = extractor.extract(reply, &window(0, 100, 400), "");
        assert_eq!(analysis.proposals[0].start, 400);
    }

    #[test]
    fn test_unmatched_start_yields_no_proposals() {
        let patterns = PatternConfig::default();
        let extractor = ResponseExtractor::new(&patterns);
        let reply = "[SEGMENT_START]\nTYPE: chapter\nTITLE: 途中\nPOSITION: 10";
        let analysis = extractor.extract(reply, &window(1, 0, 100), "ただの本文です。");
        assert!(analysis.proposals.is_empty());
        assert_eq!(analysis.strategy, Strategy::Empty);
    }

    #[test]
    fn test_falls_back_to_legacy_object() {
        let patterns = PatternConfig::default();
        let extractor = ResponseExtractor::new(&patterns);
        let reply = r#"Here you go:
```json
{"book_title": "吾輩は猫である", "segments": [{"type": "chapter", "title": "一", "start_pos_in_chunk": 0, "confidence": 0.9},], "content_summary": "猫の話"}
```"#;
        let analysis = extractor.extract(reply, &window(0, 0, 500), "");
        assert_eq!(analysis.strategy, Strategy::LegacyObject);
        assert_eq!(analysis.book_title.as_deref(), Some("吾輩は猫である"));
        assert_eq!(analysis.content_summary, "猫の話");
        assert_eq!(analysis.proposals[0].title, "一");
    }

    #[test]
    fn test_falls_back_to_heuristic() {
        let patterns = PatternConfig::default();
        let extractor = ResponseExtractor::new(&patterns);
        let text = "序文です。\n第一章 旅立ち\n本文。\n第二章 帰還\n本文。";
        let analysis = extractor.extract("I could not find anything.", &window(3, 1000, 1100), text);
        assert_eq!(analysis.strategy, Strategy::KeywordHeuristic);
        let starts: Vec<_> = analysis.proposals.iter().map(|p| p.start).collect();
        assert_eq!(starts, vec![1006, 1018]);
    }

    #[test]
    fn test_title_kept_from_earlier_strategy() {
        let patterns = PatternConfig::default();
        let extractor = ResponseExtractor::new(&patterns);
        let reply = "BOOK_TITLE: 草枕\nSEGMENTS:\nSUMMARY: 山路を登る。";
        let text = "一\n山路を登りながら、こう考えた。";
        let analysis = extractor.extract(reply, &window(0, 0, 20), text);
        assert_eq!(analysis.book_title.as_deref(), Some("草枕"));
        assert_eq!(analysis.content_summary, "山路を登る。");
        assert_eq!(analysis.strategy, Strategy::KeywordHeuristic);
    }

    #[test]
    fn test_empty_reply_is_valid_empty_result() {
        let patterns = PatternConfig::default();
        let extractor = ResponseExtractor::new(&patterns);
        let analysis = extractor.extract("", &window(1, 0, 10), "本文だけ。");
        assert_eq!(analysis.strategy, Strategy::Empty);
        assert!(analysis.book_title.is_none());
        assert!(analysis.content_summary.is_empty());
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("120"), Some(120));
        assert_eq!(parse_position("about 45 chars"), Some(45));
        assert_eq!(parse_position("１２３"), Some(123));
        assert_eq!(parse_position("unknown"), None);
    }

    #[test]
    fn test_parse_confidence() {
        assert_eq!(parse_confidence("0.85"), Some(0.85));
        assert_eq!(parse_confidence(".9"), Some(0.9));
        assert_eq!(parse_confidence("85%"), Some(0.85));
        assert_eq!(parse_confidence("high (0.7)"), Some(0.7));
        assert_eq!(parse_confidence("500"), Some(1.0));
        assert_eq!(parse_confidence("high"), None);
    }

    #[test]
    fn test_confidence_scales() {
        assert_eq!(parse_confidence("8/10"), Some(0.8));
        assert_eq!(parse_confidence("4 / 5"), Some(0.8));
        assert_eq!(parse_confidence("1.5"), Some(1.0));
        assert_eq!(parse_confidence("85"), Some(0.85));
        assert_eq!(parse_confidence("85%"), Some(0.85));
        assert_eq!(parse_confidence("3/0"), Some(1.0));
        assert_eq!(normalize_confidence(2.0), 1.0);
        assert_eq!(normalize_confidence(f32::NAN), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_book_title_placeholders() {
        assert_eq!(book_title_value("「こころ」"), Some("こころ".to_string()));
        assert_eq!(book_title_value("N/A"), None);
        assert_eq!(book_title_value(" なし "), None);
    }
}
