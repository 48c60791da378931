//! Text chunking with configurable size and overlap.
//!
//! Windows are measured in characters. Each window ends at the largest natural
//! boundary that fits (paragraph, then line, then word) and falls back to a
//! hard cut when none does. The next window always starts exactly
//! `chunk_overlap` characters before the previous cut, so dropping that prefix
//! from every chunk after the first reassembles the source text.

use crate::types::{Chunk, ChunkMetadata, SourceDocument};
use askdoc_core::{AppError, AppResult};

/// Boundaries tried in priority order before a hard character cut.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkConfig {
    /// Build a config, rejecting `chunk_size == 0` and `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Chunk a batch of documents, numbering chunks across the whole batch.
pub fn chunk_documents(documents: &[SourceDocument], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut chunk_index = 0u64;

    for document in documents {
        for (start, end, text) in split_text(&document.text, config) {
            chunks.push(Chunk {
                text: text.to_string(),
                metadata: ChunkMetadata {
                    document: document.metadata.clone(),
                    chunk_index,
                    start,
                    end,
                },
            });
            chunk_index += 1;
        }
    }

    tracing::debug!(
        "Chunked {} documents into {} chunks (size: {}, overlap: {})",
        documents.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

/// Split one text into `(start_char, end_char, slice)` windows.
pub fn split_text<'a>(text: &'a str, config: &ChunkConfig) -> Vec<(usize, usize, &'a str)> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![];
    }

    // Byte offset of every char, plus the end of the text.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());

    let len = chars.len();
    let mut windows = Vec::new();
    let mut start = 0;

    loop {
        let limit = start + config.chunk_size;
        if limit >= len {
            windows.push((start, len, &text[offsets[start]..offsets[len]]));
            break;
        }

        let cut = find_cut(&chars, start + config.chunk_overlap, limit).unwrap_or(limit);
        windows.push((start, cut, &text[offsets[start]..offsets[cut]]));

        // cut > start + overlap, so this always moves forward
        start = cut - config.chunk_overlap;
    }

    windows
}

/// Find the cut right after the last occurrence of the highest-priority
/// separator, with the cut inside `(low, high]`.
fn find_cut(chars: &[char], low: usize, high: usize) -> Option<usize> {
    for separator in SEPARATORS {
        let sep: Vec<char> = separator.chars().collect();
        let mut cut = high;
        while cut > low && cut >= sep.len() {
            if chars[cut - sep.len()..cut] == sep[..] {
                return Some(cut);
            }
            cut -= 1;
        }
    }
    None
}
