//! Parser for the tagged-block reply format:
//!
//! ```text
//! BOOK_TITLE: ...
//! SEGMENTS:
//! [SEGMENT_START]
//! TYPE: chapter
//! TITLE: ...
//! POSITION: 120
//! CONFIDENCE: 0.8
//! REASON: ...
//! QUALITY: good
//! [SEGMENT_END]
//! SUMMARY: ...
//! ```
//!
//! Only blocks closed by `[SEGMENT_END]` count. A block interrupted by
//! another `[SEGMENT_START]`, or cut off by the end of the reply, is
//! discarded.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::{
    DEFAULT_CONFIDENCE, DEFAULT_QUALITY, Parsed, RawProposal, book_title_value, clean_title,
    parse_confidence, parse_position,
};
use crate::segment::SegmentKind;

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\s*SEGMENT_(START|END)\s*\]").expect("segment tag pattern should compile")
});

static FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s*)?\**([A-Za-z_]+)\**\s*[:：]\s*(.*?)\s*$")
        .expect("field pattern should compile")
});

enum Token<'a> {
    Text(&'a str),
    Start,
    End,
}

fn tokenize(response: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in TAG.captures_iter(response) {
        let (Some(whole), Some(which)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        tokens.push(Token::Text(&response[last..whole.start()]));
        if which.as_str().eq_ignore_ascii_case("start") {
            tokens.push(Token::Start);
        } else {
            tokens.push(Token::End);
        }
        last = whole.end();
    }
    tokens.push(Token::Text(&response[last..]));

    tokens
}

fn field(line: &str) -> Option<(String, String)> {
    let caps = FIELD.captures(line)?;
    let key = caps.get(1)?.as_str().to_ascii_uppercase();
    let value = caps
        .get(2)
        .map_or("", |m| m.as_str())
        .trim_matches('*')
        .trim()
        .to_string();
    Some((key, value))
}

pub(crate) fn parse(response: &str) -> Parsed {
    let mut parsed = Parsed::default();
    let mut block: Option<HashMap<String, String>> = None;
    let mut last_key: Option<String> = None;
    let mut summary: Option<String> = None;
    let mut capturing_summary = false;

    for token in tokenize(response) {
        match token {
            Token::Start => {
                if block.is_some() {
                    debug!("Dropping segment block without [SEGMENT_END]");
                }
                block = Some(HashMap::new());
                last_key = None;
                capturing_summary = false;
            }
            Token::End => {
                match block.take() {
                    Some(fields) => match to_proposal(&fields) {
                        Some(proposal) => parsed.proposals.push(proposal),
                        None => debug!("Dropping segment block without a usable POSITION"),
                    },
                    None => debug!("Ignoring [SEGMENT_END] without [SEGMENT_START]"),
                }
                last_key = None;
            }
            Token::Text(text) => {
                for line in text.lines() {
                    match block.as_mut() {
                        Some(fields) => match field(line) {
                            Some((key, value)) => {
                                fields.insert(key.clone(), value);
                                last_key = Some(key);
                            }
                            None if !line.trim().is_empty() => {
                                if let Some(value) = last_key.as_ref().and_then(|k| fields.get_mut(k)) {
                                    value.push(' ');
                                    value.push_str(line.trim());
                                }
                            }
                            None => {}
                        },
                        None => match field(line) {
                            Some((key, value)) => {
                                capturing_summary = false;
                                match key.as_str() {
                                    "BOOK_TITLE" => {
                                        if parsed.book_title.is_none() {
                                            parsed.book_title = book_title_value(&value);
                                        }
                                    }
                                    "SUMMARY" | "CONTENT_SUMMARY" if summary.is_none() => {
                                        summary = Some(value);
                                        capturing_summary = true;
                                    }
                                    _ => {}
                                }
                            }
                            None if capturing_summary && !line.trim().is_empty() => {
                                if let Some(current) = summary.as_mut() {
                                    if !current.is_empty() {
                                        current.push(' ');
                                    }
                                    current.push_str(line.trim());
                                }
                            }
                            None => {}
                        },
                    }
                }
            }
        }
    }

    if block.is_some() {
        debug!("Reply ended inside a segment block; block discarded");
    }

    parsed.summary = summary.filter(|s| !s.is_empty());
    parsed
}

/// First non-empty value among `keys`.
fn first_field<'a>(fields: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn to_proposal(fields: &HashMap<String, String>) -> Option<RawProposal> {
    let position = first_field(fields, &["POSITION", "START_POS", "START_POS_IN_CHUNK"])
        .and_then(parse_position)?;

    Some(RawProposal {
        kind: first_field(fields, &["TYPE"])
            .and_then(SegmentKind::parse)
            .unwrap_or_default(),
        title: first_field(fields, &["TITLE"]).map(clean_title).unwrap_or_default(),
        position,
        confidence: first_field(fields, &["CONFIDENCE"])
            .and_then(parse_confidence)
            .unwrap_or(DEFAULT_CONFIDENCE),
        quality: first_field(fields, &["QUALITY", "BOUNDARY_QUALITY"])
            .unwrap_or(DEFAULT_QUALITY)
            .to_string(),
        reason: first_field(fields, &["REASON"]).map(str::to_string),
    })
}
