//! Text preparation for speech: normalization, word counting and chunking.

pub mod chunker;
mod math;
pub mod normalizer;

pub use chunker::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, chunk_text, clamp_chunk_size};
pub use normalizer::{EMPTY_PLACEHOLDER, normalize};

use serde::Serialize;

/// A word-bounded slice of normalized text, spoken as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of this chunk in its list
    pub index: usize,
    /// The text to speak
    pub text: String,
    /// Number of whitespace-separated words in `text`
    pub word_count: usize,
}

impl Chunk {
    /// Create a chunk, counting its words.
    pub fn new(index: usize, text: String) -> Self {
        let word_count = word_count(&text);
        Self {
            index,
            text,
            word_count,
        }
    }
}

/// Split text into words on whitespace, dropping empty tokens.
pub fn split_words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Total words across a chunk list.
pub fn total_words(chunks: &[Chunk]) -> usize {
    chunks.iter().map(|c| c.word_count).sum()
}
