//! Document loading: format detection, text extraction and segmentation.
//!
//! PDF pages are read once on a blocking thread, then every page is
//! interpreted on its own blocking task. The results are merged back into
//! page order by segmentation.

use std::fmt;
use std::sync::Arc;

use citelens_core::normalize::units_from_fragments;
use citelens_core::{
    segment_document, segment_text, DocumentFormat, DocumentLayout, PageUnits, RawFragment,
    SegmentConfig,
};
use pdf::{PageContent, PdfDocument};
use serde::Serialize;

use crate::error::Error;

/// Content identity of an opened document: a prefix of the md5 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    const LEN: usize = 12;

    pub fn of(bytes: &[u8]) -> Self {
        let hash = format!("{:x}", md5::compute(bytes));
        Self(hash[..Self::LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source container, sniffed from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Docx,
    Text,
}

impl SourceKind {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(SourceKind::Pdf)
        } else if bytes.starts_with(b"PK\x03\x04") {
            Some(SourceKind::Docx)
        } else if std::str::from_utf8(bytes).is_ok() {
            Some(SourceKind::Text)
        } else {
            None
        }
    }

    pub fn format(self) -> DocumentFormat {
        match self {
            SourceKind::Pdf => DocumentFormat::Paged,
            SourceKind::Docx | SourceKind::Text => DocumentFormat::Flowing,
        }
    }
}

/// Page size in document units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub page: usize,
    pub width: f32,
    pub height: f32,
}

/// A segmented document.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedDocument {
    pub id: DocumentId,
    pub name: String,
    pub kind: SourceKind,
    #[serde(skip)]
    pub layout: DocumentLayout,
    /// Empty for flowing documents.
    pub pages: Vec<PageSize>,
    /// Non-fatal extraction warnings.
    pub messages: Vec<String>,
}

impl LoadedDocument {
    pub fn format(&self) -> DocumentFormat {
        self.layout.format
    }

    pub fn page_size(&self, page: usize) -> Option<PageSize> {
        self.pages.iter().find(|p| p.page == page).copied()
    }
}

/// Turns raw bytes into a [`LoadedDocument`] using an explicit segmentation config.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    config: SegmentConfig,
}

impl Loader {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    pub async fn load(&self, name: &str, bytes: Arc<[u8]>) -> Result<LoadedDocument, Error> {
        let id = DocumentId::of(&bytes);
        let kind = SourceKind::detect(&bytes)
            .ok_or_else(|| Error::UnsupportedFormat(name.to_string()))?;

        let (layout, pages, messages) = match kind {
            SourceKind::Pdf => {
                let (layout, pages) = self.load_pdf(name, bytes).await?;
                (layout, pages, Vec::new())
            }
            SourceKind::Docx => {
                let owned = name.to_string();
                let flow = tokio::task::spawn_blocking(move || docx::extract_text(&bytes))
                    .await?
                    .map_err(|e| decode_error(&owned, e))?;
                (segment_text(&flow.text, &self.config), Vec::new(), flow.messages)
            }
            SourceKind::Text => {
                let text = std::str::from_utf8(&bytes).map_err(|e| decode_error(name, e))?;
                (segment_text(text, &self.config), Vec::new(), Vec::new())
            }
        };

        log::info!(
            "loaded {} ({:?}, id {}): {} pages, {} lines, {} blocks",
            name,
            kind,
            id,
            layout.pages.len(),
            layout.lines().count(),
            layout.blocks().count()
        );

        Ok(LoadedDocument {
            id,
            name: name.to_string(),
            kind,
            layout,
            pages,
            messages,
        })
    }

    async fn load_pdf(
        &self,
        name: &str,
        bytes: Arc<[u8]>,
    ) -> Result<(DocumentLayout, Vec<PageSize>), Error> {
        let owned = name.to_string();
        let contents = tokio::task::spawn_blocking(move || -> Result<Vec<PageContent>, Error> {
            let doc = PdfDocument::from_bytes(&bytes).map_err(|e| decode_error(&owned, e))?;
            doc.page_numbers()
                .into_iter()
                .map(|number| doc.page_content(number).map_err(|e| decode_error(&owned, e)))
                .collect()
        })
        .await??;

        let pages = contents
            .iter()
            .map(|c| PageSize {
                page: c.number as usize,
                width: c.width,
                height: c.height,
            })
            .collect();

        let tasks = contents
            .into_iter()
            .map(|content| tokio::task::spawn_blocking(move || page_units(&content)));
        let units = futures::future::try_join_all(tasks).await?;

        Ok((
            segment_document(&units, DocumentFormat::Paged, &self.config),
            pages,
        ))
    }
}

fn page_units(content: &PageContent) -> PageUnits {
    let fragments: Vec<RawFragment> = content
        .text_fragments()
        .into_iter()
        .map(|f| RawFragment {
            text: f.text,
            transform: f.transform,
            width: f.width,
            height: f.height,
        })
        .collect();

    PageUnits {
        page: content.number as usize,
        units: units_from_fragments(&fragments),
    }
}

fn decode_error(name: &str, err: impl fmt::Display) -> Error {
    Error::Decode {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
