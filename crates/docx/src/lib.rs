//! Coordinate-free flow text source for DOCX packages.
//!
//! A DOCX file is a ZIP archive; the body lives in `word/document.xml`.
//! [`extract_text`] flattens it into newline-separated paragraphs:
//!
//! - empty paragraphs stay as blank lines
//! - numbered and bulleted paragraphs get a bullet glyph prefix
//! - table rows become one line with tab-separated cells
//! - `w:tab` becomes a tab and `w:br` a newline
//!
//! Drawings and embedded objects are skipped and reported in
//! [`FlowText::messages`]. Messages are warnings, never errors.

use std::io::{Cursor, Read};

use zip::result::ZipError;
use zip::ZipArchive;

pub mod error;
pub mod parser;

pub use error::{DocxError, Result};

/// Main document part inside the package.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Plain text plus non-fatal messages produced while reading.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowText {
    pub text: String,
    pub messages: Vec<String>,
}

/// Extract the paragraph text of a DOCX document held in memory.
pub fn extract_text(bytes: &[u8]) -> Result<FlowText> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
        ZipError::FileNotFound => DocxError::MissingFile(DOCUMENT_PART.to_string()),
        other => DocxError::Zip(other),
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content)?;
    drop(file);

    parser::document_text(&content)
}
