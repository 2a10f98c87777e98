//! Block classifier.
//!
//! Rules are tried in order and the first match wins:
//!
//! 1. `list`: more than half of the lines carry a list marker
//! 2. `heading`: a single line that is either set in a large font (paged) or
//!    is short and ends with a colon (flowing)
//! 3. `table`: more than three lines starting at several x origins (paged) or
//!    tab/pipe delimiters (flowing)
//! 4. `mixed`: several lines, some of them list items
//! 5. `paragraph`: everything else

use std::collections::HashSet;

use crate::config::SegmentConfig;
use crate::model::{BlockType, DocumentFormat, TextBlock};

/// Minimum line count before a block can be a table.
const TABLE_MIN_LINES: usize = 4;

/// Distinct line origins required for a paged table.
const TABLE_MIN_COLUMNS: usize = 3;

pub fn classify_block(block: &TextBlock, format: DocumentFormat, config: &SegmentConfig) -> BlockType {
    let total = block.lines.len();
    if total == 0 {
        return BlockType::Paragraph;
    }

    let list_items = block.lines.iter().filter(|l| l.is_list_item).count();

    if list_items * 2 > total {
        return BlockType::List;
    }

    if total == 1 && is_heading(block, format, config) {
        return BlockType::Heading;
    }

    if total >= TABLE_MIN_LINES && is_table(block, format) {
        return BlockType::Table;
    }

    if total > 1 && list_items > 0 {
        return BlockType::Mixed;
    }

    BlockType::Paragraph
}

/// Classify every block in place.
pub fn classify_blocks(blocks: &mut [TextBlock], format: DocumentFormat, config: &SegmentConfig) {
    for block in blocks.iter_mut() {
        block.block_type = classify_block(block, format, config);
    }
}

fn is_heading(block: &TextBlock, format: DocumentFormat, config: &SegmentConfig) -> bool {
    let line = &block.lines[0];
    match format {
        DocumentFormat::Paged => line
            .font_size
            .is_some_and(|size| size > config.heading_font_size),
        DocumentFormat::Flowing => {
            line.char_count() < config.heading_max_chars && line.text.trim_end().ends_with(':')
        }
    }
}

fn is_table(block: &TextBlock, format: DocumentFormat) -> bool {
    match format {
        DocumentFormat::Paged => {
            let origins: HashSet<i64> = block
                .lines
                .iter()
                .map(|l| l.bbox.x.round() as i64)
                .collect();
            origins.len() >= TABLE_MIN_COLUMNS
        }
        DocumentFormat::Flowing => block
            .lines
            .iter()
            .any(|l| l.text.contains('\t') || l.text.contains('|')),
    }
}
