//! Stateful extraction over one document.

use log::{debug, warn};

use super::{ExtractionOptions, ExtractionResult, PageRange, build_chunks, extract_range};
use crate::pdf::PdfTextSource;
use crate::text::{Chunk, clamp_chunk_size};

/// Owns a document, the selected page range, the latest extraction result and
/// the position within its chunks.
///
/// Every range change bumps a generation counter. Results computed elsewhere
/// (for example on a blocking thread) are installed with
/// [`Coordinator::install_result`] and dropped if the generation has moved on.
pub struct Coordinator<S> {
    source: S,
    options: ExtractionOptions,
    page_range: PageRange,
    result: ExtractionResult,
    current_chunk: usize,
    generation: u64,
}

impl<S: PdfTextSource> Coordinator<S> {
    pub fn new(source: S, options: ExtractionOptions) -> Self {
        let total = source.page_count().unwrap_or_else(|e| {
            warn!("Could not read page count: {}", e);
            0
        });
        let page_range = PageRange::whole(total);

        Self {
            source,
            options,
            page_range,
            result: ExtractionResult::pending(page_range),
            current_chunk: 0,
            generation: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    pub fn page_range(&self) -> PageRange {
        self.page_range
    }

    pub fn total_pages(&self) -> u32 {
        self.page_range.total
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn result(&self) -> &ExtractionResult {
        &self.result
    }

    /// Select a page range and extract it.
    ///
    /// Out-of-range bounds are clamped, not rejected.
    pub fn set_page_range(&mut self, start: i64, end: i64) -> &ExtractionResult {
        self.begin_page_range(start, end);
        self.extract_current_range()
    }

    /// Select a page range without extracting it.
    ///
    /// Clears the previous result and returns the new generation together with
    /// the clamped range, for callers that extract off-thread.
    pub fn begin_page_range(&mut self, start: i64, end: i64) -> (u64, PageRange) {
        let range = PageRange::new(start, end, self.page_range.total);
        if range.start as i64 != start || range.end as i64 != end {
            warn!(
                "Requested pages {}-{} adjusted to {}-{}",
                start, end, range.start, range.end
            );
        }

        self.page_range = range;
        self.result = ExtractionResult::pending(range);
        self.current_chunk = 0;
        self.generation += 1;
        (self.generation, range)
    }

    /// Extract the currently selected range.
    pub fn extract_current_range(&mut self) -> &ExtractionResult {
        let result = extract_range(&self.source, self.page_range, &self.options);
        self.result = result;
        self.current_chunk = 0;
        &self.result
    }

    /// Select every page and extract.
    pub fn extract_all(&mut self) -> &ExtractionResult {
        self.set_page_range(1, i64::from(self.page_range.total))
    }

    /// Install a result computed for `generation`.
    ///
    /// Returns false and discards the result if a newer range was selected
    /// since.
    pub fn install_result(&mut self, generation: u64, result: ExtractionResult) -> bool {
        if generation != self.generation {
            debug!(
                "Dropping stale extraction (generation {}, current {})",
                generation, self.generation
            );
            return false;
        }

        self.result = result;
        self.current_chunk = 0;
        true
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.result.chunks
    }

    pub fn total_chunks(&self) -> usize {
        self.result.chunks.len()
    }

    pub fn is_chunked(&self) -> bool {
        self.result.is_chunked
    }

    pub fn current_chunk_index(&self) -> usize {
        self.current_chunk
    }

    /// Text of the current chunk, empty when there are no chunks.
    pub fn current_chunk_text(&self) -> &str {
        self.result
            .chunks
            .get(self.current_chunk)
            .map(|c| c.text.as_str())
            .unwrap_or("")
    }

    /// Move to the next chunk. Returns false at the last chunk.
    pub fn next_chunk(&mut self) -> bool {
        if self.current_chunk + 1 < self.result.chunks.len() {
            self.current_chunk += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous chunk. Returns false at the first chunk.
    pub fn previous_chunk(&mut self) -> bool {
        if self.current_chunk > 0 && !self.result.chunks.is_empty() {
            self.current_chunk -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to a chunk by index. Returns false if out of bounds.
    pub fn set_current_chunk(&mut self, index: usize) -> bool {
        if index < self.result.chunks.len() {
            self.current_chunk = index;
            true
        } else {
            false
        }
    }

    /// Re-split the current speech text with the current chunk size.
    ///
    /// No effect on a failed or pending result.
    pub fn force_rechunk(&mut self) {
        if !self.result.success {
            return;
        }

        let (chunks, is_chunked) = build_chunks(&self.result.speech_text, self.options.chunk_size);
        let previous =
            std::mem::replace(&mut self.result, ExtractionResult::pending(self.page_range));
        self.result = ExtractionResult {
            chunks,
            is_chunked,
            ..previous
        };
        self.current_chunk = 0;
    }

    /// Change the chunk size (clamped) and re-split the current text.
    ///
    /// Returns false if the clamped size equals the current one.
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> bool {
        let chunk_size = clamp_chunk_size(chunk_size);
        if chunk_size == self.options.chunk_size {
            return false;
        }
        self.options.chunk_size = chunk_size;
        self.force_rechunk();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::MemorySource;
    use crate::text::MIN_CHUNK_SIZE;

    fn coordinator(pages: Vec<String>, chunk_size: usize) -> Coordinator<MemorySource> {
        let options = ExtractionOptions {
            chunk_size,
            speak_page_markers: false,
        };
        Coordinator::new(MemorySource::new(pages), options)
    }

    fn pages_of(words_per_page: usize, pages: usize) -> Vec<String> {
        (0..pages).map(|_| "word ".repeat(words_per_page)).collect()
    }

    #[test]
    fn test_initial_state() {
        let coord = coordinator(pages_of(3, 4), 1000);
        assert_eq!(coord.page_range(), PageRange::whole(4));
        assert!(!coord.result().success);
        assert_eq!(coord.result().error_message, None);
        assert!(coord.result().is_pending());
        assert_eq!(coord.current_chunk_text(), "");
        assert_eq!(coord.generation(), 0);
    }

    #[test]
    fn test_set_page_range_clamps() {
        let mut coord = coordinator(pages_of(3, 10), 1000);
        let result = coord.set_page_range(-5, 9999);

        assert!(result.success);
        assert_eq!((result.page_range.start, result.page_range.end), (1, 10));
        assert_eq!(result.total_words(), 30);
    }

    #[test]
    fn test_extract_all() {
        let mut coord = coordinator(
            vec!["Hello world".into(), "Hello world".into(), "Hello world".into()],
            1000,
        );
        let result = coord.extract_all();

        assert!(result.success);
        assert!(!result.is_chunked);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].word_count, 6);
    }

    #[test]
    fn test_chunk_navigation() {
        let mut coord = coordinator(pages_of(1000, 3), MIN_CHUNK_SIZE);
        coord.extract_all();
        assert!(coord.is_chunked());
        assert_eq!(coord.total_chunks(), 3);

        assert!(!coord.previous_chunk());
        assert!(coord.next_chunk());
        assert!(coord.next_chunk());
        assert_eq!(coord.current_chunk_index(), 2);
        assert!(!coord.next_chunk());
        assert_eq!(coord.current_chunk_index(), 2);
        assert!(coord.previous_chunk());
        assert_eq!(coord.current_chunk_index(), 1);
        assert!(!coord.set_current_chunk(3));
        assert!(coord.set_current_chunk(0));
    }

    #[test]
    fn test_range_change_resets_chunk_index() {
        let mut coord = coordinator(pages_of(1000, 3), MIN_CHUNK_SIZE);
        coord.extract_all();
        coord.next_chunk();
        coord.set_page_range(2, 3);
        assert_eq!(coord.current_chunk_index(), 0);
        assert_eq!(coord.total_chunks(), 2);
    }

    #[test]
    fn test_set_chunk_size_rechunks() {
        let mut coord = coordinator(pages_of(1500, 2), 10_000);
        coord.extract_all();
        assert!(!coord.is_chunked());
        assert_eq!(coord.total_chunks(), 1);

        coord.set_chunk_size(1000);
        assert_eq!(coord.options().chunk_size, 1000);
        assert!(coord.is_chunked());
        assert_eq!(coord.total_chunks(), 3);
        assert_eq!(coord.result().total_words(), 3000);
    }

    #[test]
    fn test_set_chunk_size_clamped() {
        let mut coord = coordinator(pages_of(3, 1), 10_000);
        assert!(coord.set_chunk_size(1));
        assert_eq!(coord.options().chunk_size, MIN_CHUNK_SIZE);
        assert!(!coord.set_chunk_size(MIN_CHUNK_SIZE - 1));
        coord.set_chunk_size(1_000_000);
        assert_eq!(coord.options().chunk_size, crate::text::MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_force_rechunk_on_failed_result_is_noop() {
        let mut coord = coordinator(vec![String::new()], 1000);
        coord.extract_all();
        assert!(!coord.result().success);
        coord.force_rechunk();
        assert!(!coord.result().success);
        assert!(coord.chunks().is_empty());
    }

    #[test]
    fn test_failure_leaves_no_chunks() {
        let mut coord = coordinator(Vec::new(), 1000);
        let result = coord.extract_all();
        assert!(!result.success);
        assert!(result.error_message.is_some());
        assert_eq!(coord.current_chunk_text(), "");
        assert!(!coord.next_chunk());
        assert!(!coord.previous_chunk());
    }

    #[test]
    fn test_stale_result_dropped() {
        let mut coord = coordinator(pages_of(3, 5), 1000);
        let (first, first_range) = coord.begin_page_range(1, 2);
        let (second, second_range) = coord.begin_page_range(3, 5);
        assert!(second > first);

        let stale = extract_range(coord.source(), first_range, coord.options());
        assert!(!coord.install_result(first, stale));
        assert!(!coord.result().success);

        let fresh = extract_range(coord.source(), second_range, coord.options());
        assert!(coord.install_result(second, fresh));
        assert_eq!(coord.result().page_range, second_range);
        assert_eq!(coord.result().total_words(), 9);
    }
}
