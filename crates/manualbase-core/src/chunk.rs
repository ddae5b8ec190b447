//! Separator-aware text chunker.
//!
//! Splits extracted manual text into overlapping pieces of at most `size`
//! characters. Lengths are counted in `char`s, so multi-byte text (umlauts,
//! box-drawing tables) never splits inside a code point.
//!
//! # Algorithm
//!
//! The default [`ChunkStrategy::Recursive`] splitter:
//!
//! 1. Pick the first separator of `["\n\n", "\n", ". ", " ", ""]` that occurs
//!    in the text (`""` splits into single characters).
//! 2. Split on it, keeping the separator at the end of each piece.
//! 3. Pieces shorter than `size` are collected; longer pieces are split
//!    again with the remaining, lower-priority separators.
//! 4. Collected pieces are merged back together up to `size`. When a chunk
//!    is flushed, its trailing pieces (up to `overlap` characters) are kept
//!    as the start of the next chunk.
//!
//! [`ChunkStrategy::SlidingWindow`] is the simple fallback: a fixed window of
//! `size` advanced by `size - overlap`, with the end snapped back to the
//! last `". "` when that keeps more than half of the window.
//!
//! # Example
//!
//! ```rust
//! use manualbase_core::chunk::chunk_text;
//!
//! let pieces = chunk_text("Open valve A.\n\nClose valve B.", 1000, 200);
//! assert_eq!(pieces, vec!["Open valve A.\n\nClose valve B."]);
//! assert!(chunk_text("   \n ", 1000, 200).is_empty());
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::models::{Chunk, ChunkKind, Segment};

/// Separators tried in priority order by the recursive splitter.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Which splitting algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    #[default]
    Recursive,
    SlidingWindow,
}

/// Chunk size, overlap, and strategy for one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOptions {
    pub size: usize,
    pub overlap: usize,
    pub strategy: ChunkStrategy,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 200,
            strategy: ChunkStrategy::Recursive,
        }
    }
}

/// Split `text` with the recursive separator strategy.
///
/// # Guarantees
///
/// - Empty or whitespace-only input yields no pieces.
/// - Every returned piece is trimmed and non-empty.
/// - Pieces are in source order and together cover every non-whitespace
///   character of the input.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let (size, overlap) = normalize(size, overlap);
    if text.trim().is_empty() {
        return Vec::new();
    }
    Splitter { size, overlap }.split(text, &SEPARATORS)
}

/// Split `text` with the fixed sliding window strategy.
pub fn chunk_text_sliding(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let (size, overlap) = normalize(size, overlap);
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < n {
        let mut end = (start + size).min(n);
        if end < n {
            if let Some(pos) = rfind_sentence_end(&chars[start..end]) {
                if pos > size / 2 {
                    end = start + pos + 2;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if end >= n {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    pieces
}

/// Split `text` using the strategy selected in `opts`.
pub fn chunk_with(text: &str, opts: &ChunkOptions) -> Vec<String> {
    match opts.strategy {
        ChunkStrategy::Recursive => chunk_text(text, opts.size, opts.overlap),
        ChunkStrategy::SlidingWindow => chunk_text_sliding(text, opts.size, opts.overlap),
    }
}

/// Turn extracted segments of one source file into identified [`Chunk`]s.
///
/// Each segment is chunked on its own so page provenance stays exact.
/// Table and image indices travel into every resulting chunk's metadata.
pub fn chunk_segments(
    equipment_id: &str,
    source_file: &str,
    segments: &[Segment],
    opts: &ChunkOptions,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for segment in segments {
        let metadata = segment.metadata();
        for piece in chunk_with(&segment.text, opts) {
            chunks.push(
                Chunk::new(equipment_id, source_file, segment.page, segment.kind, piece)
                    .with_metadata(metadata.clone()),
            );
        }
    }
    chunks
}

fn normalize(size: usize, overlap: usize) -> (usize, usize) {
    let size = size.max(1);
    (size, overlap.min(size - 1))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn rfind_sentence_end(window: &[char]) -> Option<usize> {
    window
        .windows(2)
        .rposition(|pair| pair[0] == '.' && pair[1] == ' ')
}

struct Splitter {
    size: usize,
    overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, rest) = pick_separator(text, separators);

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut out = Vec::new();
        let mut good: Vec<&str> = Vec::new();

        for piece in splits {
            if char_len(piece) < self.size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge(&good));
                good.clear();
            }
            if rest.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split(piece, rest));
            }
        }

        if !good.is_empty() {
            out.extend(self.merge(&good));
        }
        out
    }

    fn merge(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            if total + len > self.size && !current.is_empty() {
                push_joined(&mut docs, &current);
                while total > self.overlap || (total + len > self.size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }

        push_joined(&mut docs, &current);
        docs
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>) {
    let joined: String = parts.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Summary of a chunk list produced by one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
    pub total_chunks: usize,
    pub total_characters: usize,
    pub avg_chunk_size: usize,
    pub files_processed: usize,
    pub pages_covered: usize,
    pub chunks_by_kind: BTreeMap<ChunkKind, usize>,
    pub files: Vec<String>,
}

impl ProcessingStats {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let mut by_kind = BTreeMap::new();
        let mut pages = BTreeSet::new();
        let mut files = BTreeSet::new();
        let mut total_characters = 0;

        for chunk in chunks {
            *by_kind.entry(chunk.kind).or_insert(0) += 1;
            pages.insert((chunk.source_file.as_str(), chunk.page_number));
            files.insert(chunk.source_file.as_str());
            total_characters += char_len(&chunk.text);
        }

        Self {
            total_chunks: chunks.len(),
            total_characters,
            avg_chunk_size: total_characters / chunks.len(),
            files_processed: files.len(),
            pages_covered: pages.len(),
            chunks_by_kind: by_kind,
            files: files.into_iter().map(String::from).collect(),
        }
    }
}
