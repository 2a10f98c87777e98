//! Coordinate-rich page text source over `lopdf`.
//!
//! ```text
//! bytes -> PdfDocument -> PageContent (ops + fonts + size) -> TextFragment[]
//!            (lopdf)        (plain data, Send)                 (interpreter)
//! ```
//!
//! [`PdfDocument::page_content`] does the only document access per page.
//! The returned [`PageContent`] owns plain data, so callers may interpret
//! pages on other threads while the document stays where it was loaded.

use thiserror::Error;

pub mod backend;
pub mod text;

use backend::{ContentOp, FontInfo, LopdfBackend, PdfBackend};
pub use text::TextFragment;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page not found: {0}")]
    PageNotFound(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document-level information.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub page_count: usize,
}

/// Everything needed to extract one page's text, detached from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    /// 1-based page number.
    pub number: u32,
    pub width: f32,
    pub height: f32,
    pub fonts: Vec<FontInfo>,
    pub ops: Vec<ContentOp>,
}

impl PageContent {
    /// Run the text interpreter over this page.
    pub fn text_fragments(&self) -> Vec<TextFragment> {
        text::extract_fragments(&self.ops, &self.fonts)
    }
}

/// A loaded PDF document.
pub struct PdfDocument {
    backend: LopdfBackend,
}

impl PdfDocument {
    /// Parse PDF bytes.  Encrypted documents are rejected with [`PdfError::Encrypted`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(Self {
            backend: LopdfBackend::load_bytes(bytes)?,
        })
    }

    pub fn page_count(&self) -> usize {
        self.backend.page_count()
    }

    /// 1-based page numbers in ascending order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.backend.pages().keys().copied().collect()
    }

    pub fn page_content(&self, number: u32) -> Result<PageContent, PdfError> {
        load_page(&self.backend, number)
    }

    pub fn info(&self) -> DocumentInfo {
        let raw = self.backend.metadata();
        DocumentInfo {
            title: raw.get("Title").cloned(),
            author: raw.get("Author").cloned(),
            creator: raw.get("Creator").cloned(),
            page_count: self.backend.page_count(),
        }
    }
}

/// Read one page through any backend.
///
/// Missing fonts are tolerated (text still decodes with the generic
/// fallback); a missing MediaBox falls back to US Letter.
pub fn load_page<B: PdfBackend + ?Sized>(backend: &B, number: u32) -> Result<PageContent, PdfError> {
    let pages = backend.pages();
    let page_id = *pages.get(&number).ok_or(PdfError::PageNotFound(number))?;

    let raw = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw)?;
    let fonts = backend.page_fonts(page_id).unwrap_or_default();
    let (width, height) = backend
        .page_dimensions(page_id)
        .unwrap_or((LETTER_WIDTH, LETTER_HEIGHT));

    log::debug!(
        "pdf page {}: {} ops, {} fonts, {}x{}",
        number,
        ops.len(),
        fonts.len(),
        width,
        height
    );

    Ok(PageContent {
        number,
        width,
        height,
        fonts,
        ops,
    })
}

const LETTER_WIDTH: f32 = 612.0;
const LETTER_HEIGHT: f32 = 792.0;
