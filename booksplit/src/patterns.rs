//! Surface-pattern tables used by the extractor, window builder and
//! boundary checks.
//!
//! The tables live in a [`PatternConfig`] value handed to each stage rather
//! than in process-wide statics, so tests can build their own variants.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Result, SplitError};
use crate::segment::SegmentKind;

/// Leading characters of common conjunctions, case particles and
/// inflectional endings, plus stray punctuation. A chunk starting with one
/// of these almost always continues the previous sentence.
const INCOMPLETE_START_CHARS: &str =
    "ためそしてまかだがれでつりすなわちおもっところさはうのよにゆえをへらいける関対どくきん、。！？";

const TERMINAL_PUNCTUATION: &str = "。！？.!?";

/// Closing quotes and brackets that may follow the terminal mark.
const CLOSING_MARKS: &str = "」』）)】〉》\"'”’";

/// Pattern tables as they appear in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    pub incomplete_start_chars: String,
    pub terminal_punctuation: String,
    pub closing_marks: String,
    /// Tokens a window may be cut after, besides the raw size limit
    pub window_breaks: Vec<String>,
    /// Line patterns announcing a chapter; an optional `title` group names it
    pub chapter_markers: Vec<String>,
    /// Line patterns announcing a section
    pub section_markers: Vec<String>,
    /// Lines containing any of these (case-insensitive) are never markers
    pub marker_exclusions: Vec<String>,
    /// Longer lines are prose, not headings
    pub max_marker_line_chars: usize,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            incomplete_start_chars: INCOMPLETE_START_CHARS.to_string(),
            terminal_punctuation: TERMINAL_PUNCTUATION.to_string(),
            closing_marks: CLOSING_MARKS.to_string(),
            window_breaks: ["。", "！", "？", ".", "!", "?", "\n\n"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chapter_markers: [
                r"^第[0-9０-９一二三四五六七八九十百千〇零]+[章編部巻]\s*(?P<title>.*)$",
                r"^[0-9０-９]+章\s*(?P<title>.*)$",
                r"(?i)^(?:chapter|part)\s+(?:[0-9]+|[ivxlcdm]+)\b[\s:.\-]*(?P<title>.*)$",
                r"^[一二三四五六七八九十]+、\s*(?P<title>.+)$",
                r"^《(?P<title>[^》]+)》$",
                r"^[一二三四五六七八九十]+$",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            section_markers: [
                r"^[0-9]+\.[0-9]+\s+(?P<title>.+)$",
                r"^[0-9]+-[0-9]+\s+(?P<title>.+)$",
                r"^第[0-9０-９一二三四五六七八九十]+節\s*(?P<title>.*)$",
                r"^[一二三四五六七八九十]+節\s*(?P<title>.*)$",
                r"(?i)^section\s+[0-9]+(?:\.[0-9]+)?\s*[:\-]?\s*(?P<title>.*)$",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            marker_exclusions: ["isbn", "978-", "979-", "tel:", "fax:"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_marker_line_chars: 60,
        }
    }
}

/// Compiled pattern tables.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    incomplete_start: HashSet<char>,
    terminal: HashSet<char>,
    closing: HashSet<char>,
    window_breaks: Vec<String>,
    chapter_markers: Vec<Regex>,
    section_markers: Vec<Regex>,
    marker_exclusions: Vec<String>,
    max_marker_line_chars: usize,
}

impl PatternConfig {
    pub fn from_settings(settings: &PatternSettings) -> Result<Self> {
        Ok(Self {
            incomplete_start: settings.incomplete_start_chars.chars().collect(),
            terminal: settings.terminal_punctuation.chars().collect(),
            closing: settings.closing_marks.chars().collect(),
            window_breaks: settings
                .window_breaks
                .iter()
                .filter(|b| !b.is_empty())
                .cloned()
                .collect(),
            chapter_markers: compile_all("chapter", &settings.chapter_markers)?,
            section_markers: compile_all("section", &settings.section_markers)?,
            marker_exclusions: settings
                .marker_exclusions
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            max_marker_line_chars: settings.max_marker_line_chars,
        })
    }

    /// Tokens a window may end after.
    pub fn window_breaks(&self) -> &[String] {
        &self.window_breaks
    }

    /// Does the text open with a conjunction/particle character?
    pub fn starts_with_particle(&self, text: &str) -> bool {
        text.trim_start()
            .chars()
            .next()
            .is_some_and(|c| self.incomplete_start.contains(&c))
    }

    /// Does the text open with a lowercase Latin letter?
    pub fn starts_lowercase_latin(&self, text: &str) -> bool {
        text.trim_start()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase())
    }

    /// Does the text end a sentence, ignoring trailing quotes and brackets?
    pub fn ends_with_terminal(&self, text: &str) -> bool {
        text.trim_end()
            .chars()
            .rev()
            .find(|c| !self.closing.contains(c) && !c.is_whitespace())
            .is_some_and(|c| self.terminal.contains(&c))
    }

    /// Does the text contain any sentence-terminal mark?
    pub fn contains_terminal(&self, text: &str) -> bool {
        text.chars().any(|c| self.terminal.contains(&c))
    }

    /// Classify a single line as a chapter or section heading.
    ///
    /// Returns the heading kind and its title (the `title` capture when
    /// present and non-empty, otherwise the whole line).
    pub fn match_marker(&self, line: &str) -> Option<(SegmentKind, String)> {
        let line = line.trim();
        if line.is_empty() || line.chars().count() > self.max_marker_line_chars {
            return None;
        }

        let lowered = line.to_lowercase();
        if self
            .marker_exclusions
            .iter()
            .any(|ex| lowered.contains(ex.as_str()))
        {
            return None;
        }

        let tables = [
            (SegmentKind::Chapter, &self.chapter_markers),
            (SegmentKind::Section, &self.section_markers),
        ];

        for (kind, patterns) in tables {
            for pattern in patterns.iter() {
                if let Some(caps) = pattern.captures(line) {
                    let title = caps
                        .name("title")
                        .map(|m| m.as_str().trim())
                        .filter(|t| !t.is_empty())
                        .unwrap_or(line);
                    return Some((kind, title.to_string()));
                }
            }
        }

        None
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self::from_settings(&PatternSettings::default())
            .expect("built-in pattern tables should compile")
    }
}

fn compile_all(kind: &'static str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|source| SplitError::InvalidPattern {
                kind,
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}
