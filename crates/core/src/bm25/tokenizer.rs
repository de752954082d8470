//! Lowercasing whitespace tokenizer.
//!
//! Tokenizes text by lowercasing and splitting on Unicode whitespace, the same
//! split used for clue, title, header, and answer tokens. Uses a
//! zero-per-token allocation design via byte spans.

use std::collections::HashSet;

/// Tokenized text: owns the lowercased buffer, provides &str slices via byte spans.
/// Only 1 heap allocation (the lowercased String) instead of N per-token Strings.
#[derive(Debug, Clone)]
pub struct Tokens {
    buffer: String,
    spans: Vec<(u32, u32)>, // (start, end) byte offsets into buffer
}

impl Tokens {
    /// Returns an iterator over the token `&str` slices.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans
            .iter()
            .map(|&(s, e)| &self.buffer[s as usize..e as usize])
    }

    /// Returns the number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if there are no tokens.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Distinct tokens as a borrowed set.
    pub fn to_set(&self) -> HashSet<&str> {
        self.iter().collect()
    }
}

/// Tokenize text: lowercase, split on whitespace.
/// Returns a Tokens struct that owns the lowercased buffer. Zero per-token allocation.
pub fn tokenize(text: &str) -> Tokens {
    let buffer = text.to_lowercase();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in buffer.char_indices() {
        if !c.is_whitespace() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start {
            spans.push((s as u32, i as u32));
            start = None;
        }
    }
    // Handle last token (no trailing separator)
    if let Some(s) = start {
        spans.push((s as u32, buffer.len() as u32));
    }

    Tokens { buffer, spans }
}
