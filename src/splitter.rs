//! Recursive character splitter that turns document text into overlapping chunks.
//!
//! Text is split on the first separator that occurs in it (paragraph, line,
//! word, then single characters). Pieces shorter than the chunk size are merged
//! greedily; pieces that are still too long are split again with the remaining
//! separators. Lengths are measured in characters.

use std::collections::VecDeque;

use tracing::warn;

use crate::documents::{Chunk, Document};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Splitter tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
    /// Separators tried in order; an empty string means "split into characters".
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: ["\n\n", "\n", " ", ""]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Greedy recursive splitter preferring natural boundaries.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    config: SplitterConfig,
}

impl RecursiveCharacterSplitter {
    /// Builds a splitter, rejecting configs whose overlap exceeds the chunk size.
    pub fn new(config: SplitterConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(config.chunk_size > 0, "chunk size must be positive");
        anyhow::ensure!(
            config.chunk_overlap <= config.chunk_size,
            "chunk overlap {} is larger than chunk size {}",
            config.chunk_overlap,
            config.chunk_size
        );
        Ok(Self { config })
    }

    /// Splits one document into ordered chunks.
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                index,
                text,
                source: document.source.clone(),
            })
            .collect()
    }

    /// Splits each document in order, keeping document order in the output.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Vec<Chunk>> {
        documents
            .iter()
            .map(|document| self.split_document(document))
            .collect()
    }

    /// Splits raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);
        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge_splits(&small));
                small.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge_splits(&small));
        }
        chunks
    }

    /// Packs pieces into chunks of at most `chunk_size`, seeding each new chunk
    /// with trailing pieces of the previous one up to `chunk_overlap`.
    fn merge_splits(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > size {
                if total > size {
                    warn!(
                        chunk_len = total,
                        chunk_size = size,
                        "created a chunk longer than the configured size"
                    );
                }
                if !window.is_empty() {
                    if let Some(chunk) = join_window(&window) {
                        merged.push(chunk);
                    }
                    while total > overlap || (total + len > size && total > 0) {
                        match window.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }
        merged
    }
}

fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    let mut picked = separators.last().map(String::as_str).unwrap_or("");
    let mut remaining: &[String] = &[];
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            picked = "";
            break;
        }
        if text.contains(separator.as_str()) {
            picked = separator;
            remaining = &separators[i + 1..];
            break;
        }
    }
    (picked, remaining)
}

/// Splits on `separator`, attaching each separator to the start of the piece
/// that follows it. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
