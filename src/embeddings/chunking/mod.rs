
use serde::{Deserialize, Serialize};
use std::iter;
use tracing::debug;

use crate::config::ConfigError;

/// A fixed-size window of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The window's text
    pub content: String,
    /// Position of this chunk in document order
    pub chunk_index: usize,
    /// Offset of the first character, counted in characters
    pub start: usize,
    /// Number of characters in the window
    pub char_count: usize,
}

/// Window geometry for splitting, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Nominal window length
    pub chunk_size: usize,
    /// Characters shared by adjacent windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }

    /// Distance between the starts of adjacent windows
    #[inline]
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Slice `text` into overlapping windows of `chunk_size` characters.
///
/// Windows start every `chunk_size - chunk_overlap` characters and splitting stops at
/// the first window that reaches the end of the text, so only the last chunk can be
/// shorter than `chunk_size`. Word and sentence boundaries are ignored.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, ConfigError> {
    config.validate()?;

    // byte offset of every char boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::with_capacity(expected_chunk_count(total_chars, config));
    let mut start = 0;

    while start < total_chars {
        let end = (start + config.chunk_size).min(total_chars);
        let Some(content) = text.get(boundaries[start]..boundaries[end]) else {
            break;
        };

        chunks.push(TextChunk {
            content: content.to_string(),
            chunk_index: chunks.len(),
            start,
            char_count: end - start,
        });

        if end == total_chars {
            break;
        }
        start += config.stride();
    }

    debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        total_chars,
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}

/// Number of chunks `split_text` produces for a text of `char_count` characters:
/// `ceil(max(L - O, 1) / (C - O))`, or zero for empty text
#[inline]
pub fn expected_chunk_count(char_count: usize, config: &ChunkingConfig) -> usize {
    if char_count == 0 || config.chunk_overlap >= config.chunk_size {
        return 0;
    }
    char_count
        .saturating_sub(config.chunk_overlap)
        .max(1)
        .div_ceil(config.stride())
}

/// Estimate token count for text (rough approximation)
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
