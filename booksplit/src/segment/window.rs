//! Overlapping analysis windows aligned to punctuation.

use crate::document::Document;
use crate::patterns::PatternConfig;

/// A bounded slice `[start, end)` of the document submitted for one
/// analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn text(&self, doc: &Document) -> String {
        doc.slice(self.start, self.end)
    }
}

/// Where a window starting at `start` should end.
///
/// Cuts after the last break token before the nominal end, as long as that
/// keeps at least half the window; otherwise keeps the raw cut.
pub fn window_end(doc: &Document, patterns: &PatternConfig, start: usize, size: usize) -> usize {
    let size = size.max(1);
    let nominal = start + size;
    if nominal >= doc.len() {
        return doc.len();
    }

    let best_break = patterns
        .window_breaks()
        .iter()
        .filter_map(|token| {
            doc.rfind(token, start, nominal)
                .map(|pos| pos + token.chars().count())
        })
        .max();

    match best_break {
        Some(end) if end >= start + size / 2 && end > start => end,
        _ => nominal,
    }
}

/// Lazy sequence of windows. Each step only depends on the previous
/// window's `(index, start)`, so iteration can be resumed anywhere with
/// [`Windows::resume`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    doc: &'a Document,
    patterns: &'a PatternConfig,
    size: usize,
    overlap: usize,
    next: Option<(usize, usize)>,
}

impl<'a> Windows<'a> {
    pub fn resume(mut self, index: usize, start: usize) -> Self {
        self.next = (start < self.doc.len()).then_some((index, start));
        self
    }
}

impl Iterator for Windows<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let (index, start) = self.next?;
        let end = window_end(self.doc, self.patterns, start, self.size);

        self.next = if end >= self.doc.len() {
            None
        } else {
            // Overlap is taken back from the actual end, not from
            // start + size, so neighbouring windows always share text.
            // Always move forward, even when the overlap would reach back
            // past the current start.
            Some((index + 1, end.saturating_sub(self.overlap).max(start + 1)))
        };

        Some(Window { index, start, end })
    }
}

/// Windows covering the whole document, in order.
pub fn windows<'a>(
    doc: &'a Document,
    patterns: &'a PatternConfig,
    size: usize,
    overlap: usize,
) -> Windows<'a> {
    Windows {
        doc,
        patterns,
        size,
        overlap,
        next: (!doc.is_empty()).then_some((0, 0)),
    }
}
