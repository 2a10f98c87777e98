use std::io;
use thiserror::Error;

/// Errors raised while reading a DOCX package.
#[derive(Error, Debug)]
pub enum DocxError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Missing required file: {0}")]
    MissingFile(String),
}

pub type Result<T> = std::result::Result<T, DocxError>;
