//! The source text, addressed by character offset.

/// Immutable original text. Every offset in the crate is a `char` index
/// into this document, never a byte index.
#[derive(Debug, Clone)]
pub struct Document {
    chars: Vec<char>,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
        }
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Characters in `[start, end)`, clamped to the document.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.len());
        let start = start.min(end);
        self.chars[start..end].iter().collect()
    }

    /// Offset of the last occurrence of `needle` lying entirely inside
    /// `[start, end)`.
    pub fn rfind(&self, needle: &str, start: usize, end: usize) -> Option<usize> {
        let needle: Vec<char> = needle.chars().collect();
        let end = end.min(self.len());
        if needle.is_empty() || end < start + needle.len() {
            return None;
        }

        (start..=end - needle.len())
            .rev()
            .find(|&pos| self.chars[pos..pos + needle.len()] == needle[..])
    }
}
