//! Text extraction: page range → normalized text → chunks.

mod coordinator;
mod range;

pub use coordinator::Coordinator;
pub use range::PageRange;

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::pdf::{PdfTextSource, SourceError};
use crate::text::{Chunk, DEFAULT_CHUNK_SIZE, chunk_text, clamp_chunk_size, normalizer, word_count};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid page range {start}-{end} for a document of {total} pages")]
    InvalidPageRange { start: u32, end: u32, total: u32 },

    #[error("Document has no pages")]
    EmptyDocument,

    #[error("No text could be extracted from pages {start}-{end}")]
    NoText { start: u32, end: u32 },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Settings that shape extraction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Word threshold above which text is split into chunks
    pub chunk_size: usize,
    /// Keep `--- Page N ---` markers in the text handed to the speech engine
    pub speak_page_markers: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            speak_page_markers: false,
        }
    }
}

impl ExtractionOptions {
    /// Set the chunk size, clamped to the supported range.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = clamp_chunk_size(chunk_size);
        self
    }

    /// Set whether page markers are spoken.
    pub fn with_speak_page_markers(mut self, speak: bool) -> Self {
        self.speak_page_markers = speak;
        self
    }
}

/// Outcome of extracting a page range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub success: bool,
    /// Why extraction failed; None on success
    pub error_message: Option<String>,
    /// Normalized text per page, each page under a `--- Page N ---` marker
    pub full_text: String,
    /// Normalized text handed to chunking and the speech engine
    pub speech_text: String,
    pub chunks: Vec<Chunk>,
    pub page_range: PageRange,
    pub is_chunked: bool,
}

impl ExtractionResult {
    /// Placeholder for a range that has not been extracted yet.
    pub fn pending(page_range: PageRange) -> Self {
        Self {
            success: false,
            error_message: None,
            full_text: String::new(),
            speech_text: String::new(),
            chunks: Vec::new(),
            page_range,
            is_chunked: false,
        }
    }

    /// Neither extracted nor failed yet.
    pub fn is_pending(&self) -> bool {
        !self.success && self.error_message.is_none()
    }

    fn failure(page_range: PageRange, error: &ExtractionError) -> Self {
        Self {
            error_message: Some(error.to_string()),
            ..Self::pending(page_range)
        }
    }

    /// Total words across all chunks.
    pub fn total_words(&self) -> usize {
        crate::text::total_words(&self.chunks)
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }
}

/// Split speech text into chunks when it exceeds the threshold.
///
/// Returns the chunk list and whether it was actually split. Text at or below
/// the threshold becomes one chunk holding the text as-is.
pub fn build_chunks(speech_text: &str, chunk_size: usize) -> (Vec<Chunk>, bool) {
    let words = word_count(speech_text);
    if words > chunk_size {
        (chunk_text(speech_text, chunk_size), true)
    } else if words == 0 {
        (Vec::new(), false)
    } else {
        (vec![Chunk::new(0, speech_text.to_string())], false)
    }
}

/// Marker line written before each page's text.
pub fn page_marker(page: u32) -> String {
    format!("--- Page {} ---", page)
}

/// Extract, normalize and chunk a page range.
///
/// Never fails outright: problems are reported through
/// [`ExtractionResult::success`] and [`ExtractionResult::error_message`].
/// Pages without text are skipped; only a range with no text at all is an
/// error.
pub fn extract_range(
    source: &dyn PdfTextSource,
    range: PageRange,
    options: &ExtractionOptions,
) -> ExtractionResult {
    match try_extract_range(source, range, options) {
        Ok(result) => result,
        Err(e) => {
            info!("Extraction of {} failed: {}", range, e);
            ExtractionResult::failure(range, &e)
        }
    }
}

fn try_extract_range(
    source: &dyn PdfTextSource,
    range: PageRange,
    options: &ExtractionOptions,
) -> Result<ExtractionResult, ExtractionError> {
    let total = source.page_count()?;
    if total == 0 {
        return Err(ExtractionError::EmptyDocument);
    }

    if range.start < 1 || range.start > range.end || range.end > total {
        return Err(ExtractionError::InvalidPageRange {
            start: range.start,
            end: range.end,
            total,
        });
    }

    let mut full_text = String::new();
    let mut speech_raw = String::new();

    for page in range.pages() {
        let raw = source.page_text(page)?;
        let Some(page_text) = normalizer::normalize_content(&raw) else {
            debug!("Page {} has no text", page);
            continue;
        };

        let marker = page_marker(page);
        full_text.push_str(&marker);
        full_text.push('\n');
        full_text.push_str(&page_text);
        full_text.push_str("\n\n");

        if options.speak_page_markers {
            speech_raw.push_str(&marker);
            speech_raw.push('\n');
        }
        speech_raw.push_str(&raw);
        speech_raw.push_str("\n\n");
    }

    let speech_text =
        normalizer::normalize_content(&speech_raw).ok_or(ExtractionError::NoText {
            start: range.start,
            end: range.end,
        })?;

    let (chunks, is_chunked) = build_chunks(&speech_text, options.chunk_size);
    debug!(
        "Extracted {}: {} words in {} chunk(s)",
        range,
        crate::text::total_words(&chunks),
        chunks.len()
    );

    Ok(ExtractionResult {
        success: true,
        error_message: None,
        full_text: full_text.trim_end().to_string(),
        speech_text,
        chunks,
        page_range: range,
        is_chunked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::MemorySource;

    fn options(chunk_size: usize) -> ExtractionOptions {
        ExtractionOptions {
            chunk_size,
            speak_page_markers: false,
        }
    }

    #[test]
    fn test_three_pages_single_chunk() {
        let source = MemorySource::new(["Hello world", "Hello world", "Hello world"]);
        let result = extract_range(&source, PageRange::whole(3), &options(1000));

        assert!(result.success);
        assert!(!result.is_chunked);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].word_count, 6);

        let p1 = result.full_text.find("--- Page 1 ---").unwrap();
        let p2 = result.full_text.find("--- Page 2 ---").unwrap();
        let p3 = result.full_text.find("--- Page 3 ---").unwrap();
        assert!(p1 < p2 && p2 < p3);
        assert!(!result.speech_text.contains("--- Page"));
    }

    #[test]
    fn test_speak_page_markers() {
        let source = MemorySource::new(["Hello", "world"]);
        let opts = options(1000).with_speak_page_markers(true);
        let result = extract_range(&source, PageRange::whole(2), &opts);

        assert_eq!(
            result.speech_text,
            "--- Page 1 ---\nHello --- Page 2 ---\nworld"
        );
    }

    #[test]
    fn test_chunked_when_over_threshold() {
        let page = "word ".repeat(30);
        let source = MemorySource::new([page.as_str(), page.as_str()]);
        let result = extract_range(&source, PageRange::whole(2), &options(25));

        assert!(result.success);
        assert!(result.is_chunked);
        let counts: Vec<usize> = result.chunks.iter().map(|c| c.word_count).collect();
        assert_eq!(counts, vec![25, 25, 10]);
        assert_eq!(result.total_words(), 60);
    }

    #[test]
    fn test_empty_pages_are_skipped() {
        let source = MemorySource::new(["", "Only page two", "   "]);
        let result = extract_range(&source, PageRange::whole(3), &options(1000));

        assert!(result.success);
        assert!(!result.full_text.contains("--- Page 1 ---"));
        assert!(result.full_text.contains("--- Page 2 ---"));
        assert!(!result.full_text.contains("--- Page 3 ---"));
        assert_eq!(result.speech_text, "Only page two");
    }

    #[test]
    fn test_no_text_in_range_fails() {
        let source = MemorySource::new(["", "\u{200B}", "Text"]);
        let result = extract_range(&source, PageRange::new(1, 2, 3), &options(1000));

        assert!(!result.success);
        assert!(result.chunks.is_empty());
        assert_eq!(
            result.error_message.as_deref(),
            Some("No text could be extracted from pages 1-2")
        );
    }

    #[test]
    fn test_zero_page_document_fails() {
        let source = MemorySource::default();
        let result = extract_range(&source, PageRange::whole(0), &options(1000));

        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("Document has no pages"));
    }

    #[test]
    fn test_range_beyond_document_fails() {
        let source = MemorySource::new(["a", "b"]);
        let range = PageRange {
            start: 2,
            end: 5,
            total: 5,
        };
        let result = extract_range(&source, range, &options(1000));

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("Invalid page range"));
    }

    #[test]
    fn test_text_is_normalized() {
        let source = MemorySource::new(["x \\leq y\u{00A0}\u{00A0}and \\alpha"]);
        let result = extract_range(&source, PageRange::whole(1), &options(1000));
        assert_eq!(result.speech_text, "x less than or equal to y and alpha");
    }

    #[test]
    fn test_build_chunks() {
        let (chunks, chunked) = build_chunks("a b c", 3);
        assert!(!chunked);
        assert_eq!(chunks.len(), 1);

        let (chunks, chunked) = build_chunks("a b c d", 3);
        assert!(chunked);
        assert_eq!(chunks.len(), 2);

        let (chunks, chunked) = build_chunks("", 3);
        assert!(!chunked);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_options_clamp_chunk_size() {
        assert_eq!(ExtractionOptions::default().with_chunk_size(5).chunk_size, 1000);
    }
}
