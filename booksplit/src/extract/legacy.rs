//! Parser for the older reply shape: a JSON object with `book_title`,
//! `segments[]` and `content_summary`, usually wrapped in prose or a code
//! fence and often syntactically broken.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::{
    DEFAULT_CONFIDENCE, DEFAULT_QUALITY, Parsed, RawProposal, book_title_value, clean_title,
    normalize_confidence, parse_confidence, parse_position,
};
use crate::segment::SegmentKind;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\n?(.*?)```").expect("code fence pattern should compile")
});

/// String/escape state of a character-by-character JSON scan, plus the
/// closers still owed for open `{` and `[`.
#[derive(Debug, Default)]
struct ScanState {
    in_string: bool,
    escaped: bool,
    closers: Vec<char>,
}

impl ScanState {
    /// Advance over `c`. Returns true when `c` is structural, i.e. not part
    /// of a string literal.
    fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return false;
        }

        match c {
            '"' => self.in_string = true,
            '{' => self.closers.push('}'),
            '[' => self.closers.push(']'),
            _ => {}
        }
        true
    }
}

pub(crate) fn parse(response: &str) -> Parsed {
    for candidate in candidates(response) {
        let value = match serde_json::from_str::<Value>(candidate) {
            Ok(value) => value,
            Err(e) => {
                let repaired = repair(candidate);
                match serde_json::from_str::<Value>(&repaired) {
                    Ok(value) => {
                        debug!("Parsed legacy object after repair ({e})");
                        value
                    }
                    Err(e) => {
                        debug!("Legacy candidate unusable after repair: {e}");
                        continue;
                    }
                }
            }
        };

        let parsed = from_value(&value);
        if !parsed.proposals.is_empty() || parsed.book_title.is_some() {
            return parsed;
        }
    }

    Parsed::default()
}

/// Text spans that may hold the object, most specific first.
fn candidates(response: &str) -> Vec<&str> {
    let mut found: Vec<&str> = FENCE
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| s.starts_with('{') || s.starts_with('['))
        .collect();

    let (objects, unterminated) = balanced_objects(response);
    found.extend(objects);
    // A cut-off tail closes to more proposals than the span ending at its
    // last complete object.
    found.extend(unterminated);

    if let (Some(first), Some(last)) = (response.find('{'), response.rfind('}')) {
        if first < last {
            found.push(&response[first..=last]);
        }
    }

    let mut unique = Vec::with_capacity(found.len());
    for candidate in found {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Top-level `{...}` spans whose braces balance outside string literals,
/// and the start of a trailing object that never closes.
fn balanced_objects(text: &str) -> (Vec<&str>, Option<&str>) {
    let mut objects = Vec::new();
    let mut open_at: Option<usize> = None;
    let mut state = ScanState::default();

    for (i, c) in text.char_indices() {
        let Some(start) = open_at else {
            if c == '{' {
                open_at = Some(i);
                state = ScanState::default();
                state.feed(c);
            }
            continue;
        };

        if !state.feed(c) {
            continue;
        }
        if (c == '}' || c == ']') && state.closers.last() == Some(&c) {
            state.closers.pop();
            if state.closers.is_empty() {
                objects.push(&text[start..i + c.len_utf8()]);
                open_at = None;
            }
        }
    }

    (objects, open_at.map(|start| &text[start..]))
}

/// Best-effort syntactic repair of a broken object.
fn repair(candidate: &str) -> String {
    let collapsed = collapse_duplicate_quotes(candidate);
    let without_commas = strip_trailing_commas(&collapsed);
    auto_close(&without_commas)
}

/// `""key""` becomes `"key"`; a real empty string `""` between structural
/// characters is kept.
fn collapse_duplicate_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '"' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&c| c == '"').count();
        let before = out.trim_end().chars().last();
        let after = chars[i + run..].iter().find(|c| !c.is_whitespace());
        let empty_string = run == 2
            && matches!(before, Some(':' | '[' | ',' | '{'))
            && matches!(after, Some(',' | '}' | ']' | ':'));

        out.push('"');
        if empty_string {
            out.push('"');
        }
        i += run;
    }

    out
}

/// Drop commas directly followed by a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut state = ScanState::default();
    let mut out = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        let structural = state.feed(c);
        if structural && c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }

    out
}

/// Close whatever the text leaves open: a string literal, a dangling
/// key/value separator, and every unclosed `{` or `[`. Stray closers that
/// match nothing are dropped.
fn auto_close(text: &str) -> String {
    let mut state = ScanState::default();
    let mut out = String::with_capacity(text.len() + 8);

    for c in text.chars() {
        let was_in_string = state.in_string;
        let structural = state.feed(c);
        if !was_in_string && structural && (c == '}' || c == ']') {
            if state.closers.last() == Some(&c) {
                state.closers.pop();
            } else {
                continue;
            }
        }
        out.push(c);
    }

    if state.in_string {
        if state.escaped {
            out.pop();
        }
        out.push('"');
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str("null");
    }

    while let Some(closer) = state.closers.pop() {
        out.push(closer);
    }
    out
}

fn from_value(value: &Value) -> Parsed {
    match value {
        Value::Object(map) => from_object(map),
        Value::Array(items) => Parsed {
            proposals: items.iter().filter_map(proposal_from).collect(),
            ..Parsed::default()
        },
        _ => Parsed::default(),
    }
}

fn from_object(map: &Map<String, Value>) -> Parsed {
    let text = |key: &str| map.get(key).and_then(Value::as_str);

    let segments = ["segments", "chapters", "sections"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array));

    Parsed {
        book_title: text("book_title")
            .or_else(|| text("title"))
            .and_then(book_title_value),
        proposals: segments
            .map(|items| items.iter().filter_map(proposal_from).collect())
            .unwrap_or_default(),
        summary: text("content_summary")
            .or_else(|| text("summary"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    }
}

fn proposal_from(item: &Value) -> Option<RawProposal> {
    let map = item.as_object()?;
    let field = |keys: &[&str]| keys.iter().find_map(|key| map.get(*key));

    let position = field(&["start_pos_in_chunk", "position", "start_pos", "start"])
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => parse_position(s),
            _ => None,
        })?;

    let confidence = field(&["confidence"])
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64().map(|n| normalize_confidence(n as f32)),
            Value::String(s) => parse_confidence(s),
            _ => None,
        })
        .unwrap_or(DEFAULT_CONFIDENCE);

    let as_text = |keys: &[&str]| {
        field(keys)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    Some(RawProposal {
        kind: as_text(&["type", "kind"])
            .and_then(SegmentKind::parse)
            .unwrap_or_default(),
        title: as_text(&["title", "name"]).map(clean_title).unwrap_or_default(),
        position,
        confidence,
        quality: as_text(&["boundary_quality", "quality"])
            .unwrap_or(DEFAULT_QUALITY)
            .to_string(),
        reason: as_text(&["reason"]).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let reply = r#"{"book_title": "羅生門", "segments": [{"type": "chapter", "title": "上", "start_pos_in_chunk": 0, "confidence": 0.9, "boundary_quality": "good", "reason": "opening"}], "content_summary": "下人の話"}"#;
        let parsed = parse(reply);
        assert_eq!(parsed.book_title.as_deref(), Some("羅生門"));
        assert_eq!(parsed.summary.as_deref(), Some("下人の話"));
        let proposal = &parsed.proposals[0];
        assert_eq!(proposal.title, "上");
        assert_eq!(proposal.confidence, 0.9);
        assert_eq!(proposal.quality, "good");
        assert_eq!(proposal.reason.as_deref(), Some("opening"));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_scanner() {
        let reply = r#"Result: {"segments": [{"title": "The {curly} \"quoted\" one", "position": 42}]} trailing {noise"#;
        let parsed = parse(reply);
        assert_eq!(parsed.proposals.len(), 1);
        assert_eq!(parsed.proposals[0].title, r#"The {curly} "quoted" one"#);
        assert_eq!(parsed.proposals[0].position, 42);
    }

    #[test]
    fn test_trailing_commas_repaired() {
        let reply = r#"{"segments": [{"title": "一", "position": 0,}, {"title": "二", "position": 90},],}"#;
        let parsed = parse(reply);
        assert_eq!(parsed.proposals.len(), 2);
    }

    #[test]
    fn test_truncated_object_auto_closed() {
        let reply = r#"```json
{"book_title": "山月記", "segments": [{"title": "一", "position": 0, "confidence": "0.8"}, {"title": "二", "posi"#;
        let parsed = parse(reply);
        assert_eq!(parsed.book_title.as_deref(), Some("山月記"));
        assert_eq!(parsed.proposals.len(), 1);
        assert_eq!(parsed.proposals[0].confidence, 0.8);
    }

    #[test]
    fn test_truncation_inside_value_keeps_complete_segments() {
        let reply = r#"{"segments": [{"title": "一", "position": 0}, {"title": "二", "position": 50}, {"title": "三", "position": 90, "reason": "cut off mid"#;
        let parsed = parse(reply);
        assert_eq!(parsed.proposals.len(), 3);
        assert_eq!(parsed.proposals[2].title, "三");
        assert_eq!(parsed.proposals[2].position, 90);
        assert_eq!(parsed.proposals[2].reason.as_deref(), Some("cut off mid"));
    }

    #[test]
    fn test_duplicate_quotes_collapsed() {
        let reply = r#"{""segments"": [{""title"": ""序"", ""position"": 3, ""reason"": ""}]}"#;
        let parsed = parse(reply);
        assert_eq!(parsed.proposals.len(), 1);
        assert_eq!(parsed.proposals[0].title, "序");
        assert!(parsed.proposals[0].reason.is_none());
    }

    #[test]
    fn test_no_object_returns_empty() {
        assert_eq!(parse("No JSON here at all."), Parsed::default());
        assert_eq!(parse("{ this is not json at all"), Parsed::default());
    }

    #[test]
    fn test_balanced_objects_reports_unterminated_tail() {
        let (objects, tail) = balanced_objects(r#"a {"x": "}"} b {"y": [1, 2"#);
        assert_eq!(objects, vec![r#"{"x": "}"}"#]);
        assert_eq!(tail, Some(r#"{"y": [1, 2"#));
    }

    #[test]
    fn test_auto_close_handles_open_string_and_separator() {
        assert_eq!(auto_close(r#"{"a": "unfinished"#), r#"{"a": "unfinished"}"#);
        assert_eq!(auto_close(r#"{"a": "#), r#"{"a":null}"#);
        assert_eq!(auto_close(r#"{"a": [1, 2,"#), r#"{"a": [1, 2]}"#);
        assert_eq!(auto_close(r#"{"a": 1}]"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_collapse_keeps_real_empty_strings() {
        assert_eq!(collapse_duplicate_quotes(r#"{"a": "", "b": 1}"#), r#"{"a": "", "b": 1}"#);
        assert_eq!(collapse_duplicate_quotes(r#"{""a"": 1}"#), r#"{"a": 1}"#);
    }
}
