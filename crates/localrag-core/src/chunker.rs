//! Overlap-aware recursive text splitting.
//!
//! Text is first cut into pieces along a prioritized separator list: the
//! first separator present in an oversized span splits it (the separator stays
//! at the end of its piece), and any piece still larger than `chunk_size`
//! is split again with the remaining separators, or hard-cut when none apply.
//!
//! Pieces are then merged greedily. Each chunk ends at the furthest piece
//! boundary that keeps it within `chunk_size`, and the next chunk starts
//! `overlap` characters before that end. Consecutive chunks therefore share
//! exactly `overlap` characters, and dropping that prefix from every chunk but
//! the first reconstructs the input.
//!
//! All sizes and offsets count `char`s, not bytes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            separators: ["\n\n", "\n", ".", "!", "?", ",", " "].iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap, ..Self::default() }
    }

    #[must_use]
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        // A one-char chunk can be a lone space, which is dropped and would lose text.
        if self.chunk_size < 2 {
            return Err(Error::InvalidConfig(format!("chunk_size must be at least 2, got {}", self.chunk_size)));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// One emitted chunk: its text and where it starts in the input, in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start_offset: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    /// Fails when `overlap >= chunk_size`; a built chunker never errors.
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        let chars = CharIndex::new(text);
        let len = chars.len();
        if len == 0 {
            return Vec::new();
        }

        let mut boundaries = Vec::new();
        self.collect_boundaries(text, &chars, 0, len, &self.config.separators, &mut boundaries);
        boundaries.sort_unstable();
        boundaries.dedup();

        let size = self.config.chunk_size;
        let overlap = self.config.overlap;
        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            let end = if start + size >= len {
                len
            } else {
                self.pick_end(text, &chars, &boundaries, start, start + size)
            };
            let span = chars.slice(text, start, end);
            if span.trim().is_empty() {
                tracing::debug!(start, end, "dropping whitespace-only span");
            } else {
                spans.push(TextSpan { text: span.to_string(), start_offset: start });
            }
            if end >= len {
                break;
            }
            start = end - overlap;
        }
        spans
    }

    /// Chooses where the chunk starting at `start` ends, strictly after
    /// `start + overlap` so that the next chunk makes progress.
    fn pick_end(&self, text: &str, chars: &CharIndex, boundaries: &[usize], start: usize, limit: usize) -> usize {
        let min_end = start + self.config.overlap;
        let non_blank = |end: usize| !chars.slice(text, start, end).trim().is_empty();

        let furthest = boundaries.partition_point(|&b| b <= limit);
        if let Some(&b) = furthest.checked_sub(1).and_then(|i| boundaries.get(i)) {
            if b > min_end && non_blank(b) {
                return b;
            }
        }

        // The window starts inside a piece: look for a separator in it directly.
        let window = chars.slice(text, min_end, limit);
        let window_byte_start = chars.byte(min_end);
        for sep in self.config.separators.iter().filter(|s| !s.is_empty()) {
            if let Some(pos) = window.rfind(sep.as_str()) {
                let end = chars.char_at_byte(window_byte_start + pos + sep.len());
                if end > min_end && non_blank(end) {
                    return end;
                }
            }
        }
        limit
    }

    fn collect_boundaries(
        &self,
        text: &str,
        chars: &CharIndex,
        start: usize,
        end: usize,
        separators: &[String],
        out: &mut Vec<usize>,
    ) {
        let size = self.config.chunk_size;
        if end - start <= size {
            out.push(end);
            return;
        }

        let span = chars.slice(text, start, end);
        let span_byte_start = chars.byte(start);
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if !span.contains(sep.as_str()) {
                continue;
            }
            let rest = &separators[i + 1..];
            let mut piece_start = start;
            for (pos, matched) in span.match_indices(sep.as_str()) {
                let piece_end = chars.char_at_byte(span_byte_start + pos + matched.len());
                if piece_end > piece_start {
                    self.collect_boundaries(text, chars, piece_start, piece_end, rest, out);
                    piece_start = piece_end;
                }
            }
            if piece_start < end {
                self.collect_boundaries(text, chars, piece_start, end, rest, out);
            }
            return;
        }

        let mut pos = start;
        while pos < end {
            pos = (pos + size).min(end);
            out.push(pos);
        }
    }
}

/// Byte offset of every char boundary, so spans can be addressed in chars.
struct CharIndex {
    bytes: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let bytes = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        Self { bytes }
    }

    fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    fn byte(&self, char_pos: usize) -> usize {
        self.bytes[char_pos]
    }

    /// `byte` must sit on a char boundary, which holds for separator match ends.
    fn char_at_byte(&self, byte: usize) -> usize {
        match self.bytes.binary_search(&byte) {
            Ok(i) | Err(i) => i,
        }
    }

    fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        &text[self.bytes[start]..self.bytes[end]]
    }
}
