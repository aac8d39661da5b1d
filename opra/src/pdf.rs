//! PDF text sources.
//!
//! The extraction coordinator only needs two things from a document: how many
//! pages it has and the raw text of a given page. Pages are 1-indexed
//! throughout.

use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open PDF {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Failed to extract text from page {page}: {message}")]
    Extract { page: u32, message: String },
}

/// Supplies raw per-page text for a document
pub trait PdfTextSource: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self) -> Result<u32, SourceError>;

    /// Raw text of a 1-indexed page; empty for image-only pages
    fn page_text(&self, page: u32) -> Result<String, SourceError>;
}

impl<T: PdfTextSource + ?Sized> PdfTextSource for std::sync::Arc<T> {
    fn page_count(&self) -> Result<u32, SourceError> {
        (**self).page_count()
    }

    fn page_text(&self, page: u32) -> Result<String, SourceError> {
        (**self).page_text(page)
    }
}

/// PDF file parsed with lopdf
pub struct LopdfSource {
    path: PathBuf,
    document: lopdf::Document,
    /// Page numbers as lopdf reports them, in order
    pages: Vec<u32>,
}

impl LopdfSource {
    /// Open and parse a PDF file
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let document = lopdf::Document::load(path).map_err(|e| SourceError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        debug!("Opened {} ({} pages)", path.display(), pages.len());

        Ok(Self {
            path: path.to_path_buf(),
            document,
            pages,
        })
    }

    /// Path the document was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PdfTextSource for LopdfSource {
    fn page_count(&self) -> Result<u32, SourceError> {
        Ok(self.pages.len() as u32)
    }

    fn page_text(&self, page: u32) -> Result<String, SourceError> {
        let total = self.pages.len() as u32;
        let page_number = page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .copied()
            .ok_or(SourceError::PageOutOfRange { page, total })?;

        self.document
            .extract_text(&[page_number])
            .map_err(|e| SourceError::Extract {
                page,
                message: e.to_string(),
            })
    }
}

/// Document whose page texts are already in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<String>,
}

impl MemorySource {
    /// Create a source from page texts in order
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }

    /// Treat form feeds as page breaks, the way `pdftotext` output is laid out
    pub fn from_form_feeds(text: &str) -> Self {
        let mut pages: Vec<&str> = text.split('\u{0C}').collect();
        // pdftotext ends every page with a form feed
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        Self::new(pages)
    }
}

impl PdfTextSource for MemorySource {
    fn page_count(&self) -> Result<u32, SourceError> {
        Ok(self.pages.len() as u32)
    }

    fn page_text(&self, page: u32) -> Result<String, SourceError> {
        let total = self.pages.len() as u32;
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .cloned()
            .ok_or(SourceError::PageOutOfRange { page, total })
    }
}
