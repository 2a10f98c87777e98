//! Page and document segmentation: units → lines → classified blocks.
//!
//! Grouping never spans pages.  Pages may arrive in any order (they are
//! extracted concurrently upstream) and are put back into page order here.

use serde::{Deserialize, Serialize};

use crate::blocks::group_lines_into_blocks;
use crate::classify::classify_blocks;
use crate::config::SegmentConfig;
use crate::lines::group_units_into_lines;
use crate::model::{DocumentFormat, PageUnits, TextBlock, TextLine};
use crate::normalize::units_from_text;

/// Lines and blocks of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page: usize,
    pub lines: Vec<TextLine>,
    pub blocks: Vec<TextBlock>,
}

/// The derived structure of a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub format: DocumentFormat,
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    pub fn page(&self, page: usize) -> Option<&PageLayout> {
        self.pages.iter().find(|p| p.page == page)
    }

    pub fn lines(&self) -> impl Iterator<Item = &TextLine> {
        self.pages.iter().flat_map(|p| p.lines.iter())
    }

    pub fn blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.lines.is_empty())
    }
}

/// Segment the units of one page.
pub fn segment_page(page: &PageUnits, format: DocumentFormat, config: &SegmentConfig) -> PageLayout {
    let lines = group_units_into_lines(&page.units, page.page, format, config);
    let mut blocks = group_lines_into_blocks(lines.clone(), format, config);
    classify_blocks(&mut blocks, format, config);

    log::debug!(
        "page {}: {} units, {} lines, {} blocks",
        page.page,
        page.units.len(),
        lines.len(),
        blocks.len()
    );

    PageLayout {
        page: page.page,
        lines,
        blocks,
    }
}

/// Segment every page, returning pages in ascending page order.
pub fn segment_document(
    pages: &[PageUnits],
    format: DocumentFormat,
    config: &SegmentConfig,
) -> DocumentLayout {
    let mut layouts: Vec<PageLayout> = pages
        .iter()
        .map(|p| segment_page(p, format, config))
        .collect();
    layouts.sort_by_key(|p| p.page);

    DocumentLayout {
        format,
        pages: layouts,
    }
}

/// Segment extracted flow text as a single-page flowing document.
pub fn segment_text(text: &str, config: &SegmentConfig) -> DocumentLayout {
    let page = PageUnits {
        page: 1,
        units: units_from_text(text, config),
    };
    segment_document(&[page], DocumentFormat::Flowing, config)
}
