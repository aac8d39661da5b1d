//! Word-bounded chunking for speech engines.
//!
//! Engines fed very large utterances stall or crash, so long text is cut into
//! chunks of at most a fixed number of words. Boundaries depend only on the
//! word sequence and the threshold.

use log::warn;

use super::{Chunk, split_words};

/// Default chunk size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Smallest chunk size accepted from configuration.
pub const MIN_CHUNK_SIZE: usize = 1_000;

/// Largest chunk size accepted from configuration.
pub const MAX_CHUNK_SIZE: usize = 50_000;

/// Clamp a configured chunk size into the supported range.
pub fn clamp_chunk_size(size: usize) -> usize {
    let clamped = size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
    if clamped != size {
        warn!(
            "Chunk size {} out of range {}-{}, using {}",
            size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE, clamped
        );
    }
    clamped
}

/// Split text into chunks of at most `max_words` words.
///
/// # Arguments
/// * `text` - Normalized text
/// * `max_words` - Word threshold per chunk; 0 is treated as 1
///
/// # Returns
/// Chunks in reading order. Every chunk but the last holds exactly
/// `max_words` words. Text without words yields no chunks.
pub fn chunk_text(text: &str, max_words: usize) -> Vec<Chunk> {
    let max_words = max_words.max(1);
    let words = split_words(text);

    words
        .chunks(max_words)
        .enumerate()
        .map(|(index, slice)| Chunk {
            index,
            text: slice.join(" "),
            word_count: slice.len(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_chunk_short_text() {
        let chunks = chunk_text("Hello world. How are you?", 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world. How are you?");
        assert_eq!(chunks[0].word_count, 5);
    }

    #[test]
    fn test_chunk_exact_multiple() {
        let chunks = chunk_text("a b c d e f", 3);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a b c");
        assert_eq!(chunks[1].text, "d e f");
    }

    #[test]
    fn test_chunk_remainder() {
        let chunks = chunk_text("one two three four five six seven", 3);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one two three", "four five six", "seven"]);
        assert_eq!(chunks[2].word_count, 1);
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("   \n\n  ", 10).is_empty());
    }

    #[test]
    fn test_chunk_zero_threshold() {
        let chunks = chunk_text("a b", 0);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_chunk_collapses_inner_whitespace() {
        let chunks = chunk_text("a\n b\t\tc", 10);
        assert_eq!(chunks[0].text, "a b c");
    }

    #[test]
    fn test_clamp_chunk_size() {
        assert_eq!(clamp_chunk_size(10), MIN_CHUNK_SIZE);
        assert_eq!(clamp_chunk_size(1_000_000), MAX_CHUNK_SIZE);
        assert_eq!(clamp_chunk_size(DEFAULT_CHUNK_SIZE), DEFAULT_CHUNK_SIZE);
    }

    proptest! {
        #[test]
        fn prop_chunks_rejoin_to_source(words in prop::collection::vec("[a-z]{1,8}", 0..200), max in 1usize..40) {
            let text = words.join("  ");
            let chunks = chunk_text(&text, max);
            let rejoined: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(rejoined.join(" "), words.join(" "));
        }

        #[test]
        fn prop_chunk_counts(words in prop::collection::vec("[a-z]{1,8}", 1..200), max in 1usize..40) {
            let text = words.join(" ");
            let chunks = chunk_text(&text, max);
            let n = words.len();

            prop_assert_eq!(chunks.len(), n.div_ceil(max));
            for chunk in &chunks[..chunks.len() - 1] {
                prop_assert_eq!(chunk.word_count, max);
            }
            let last = n - (chunks.len() - 1) * max;
            prop_assert_eq!(chunks[chunks.len() - 1].word_count, last);
            if n <= max {
                prop_assert_eq!(chunks.len(), 1);
            }
        }

        #[test]
        fn prop_chunking_is_deterministic(words in prop::collection::vec("[a-z]{1,8}", 0..100), max in 1usize..20) {
            let text = words.join(" ");
            prop_assert_eq!(chunk_text(&text, max), chunk_text(&text, max));
        }
    }
}
