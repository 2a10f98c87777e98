//! Block grouper: a greedy single pass that merges related lines.
//!
//! A line continues the current block when it is vertically close to the
//! block's last line *and* either horizontally close (paged) or structurally
//! related (flowing).  Over-grouping is tolerated; an over-grouped block is
//! still a usable citation, an orphaned heading is not.

use std::cmp::Ordering;

use crate::config::SegmentConfig;
use crate::model::{DocumentFormat, TextBlock, TextLine};

/// Group one page's lines into blocks.
///
/// Lines are first ordered top-to-bottom, then left-to-right.  The returned
/// blocks are unclassified (`BlockType::Paragraph`); see
/// [`crate::classify::classify_block`].
pub fn group_lines_into_blocks(
    mut lines: Vec<TextLine>,
    format: DocumentFormat,
    config: &SegmentConfig,
) -> Vec<TextBlock> {
    sort_reading_order(&mut lines, format);

    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut current: Option<TextBlock> = None;

    for line in lines {
        current = match current.take() {
            Some(mut block) if continues_block(block.last_line(), &line, format, config) => {
                block.push(line);
                Some(block)
            }
            Some(block) => {
                blocks.push(block);
                Some(TextBlock::start(line))
            }
            None => Some(TextBlock::start(line)),
        };
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

fn sort_reading_order(lines: &mut [TextLine], format: DocumentFormat) {
    lines.sort_by(|a, b| {
        let vertical = match format {
            // Bottom-up space: larger y is higher on the page.
            DocumentFormat::Paged => b.bbox.y.partial_cmp(&a.bbox.y),
            DocumentFormat::Flowing => a.bbox.y.partial_cmp(&b.bbox.y),
        };
        vertical
            .unwrap_or(Ordering::Equal)
            .then(a.bbox.x.partial_cmp(&b.bbox.x).unwrap_or(Ordering::Equal))
    });
}

/// Continuation test between the current block's last line and `next`.
fn continues_block(
    prev: &TextLine,
    next: &TextLine,
    format: DocumentFormat,
    config: &SegmentConfig,
) -> bool {
    let vertical = (prev.bbox.y - next.bbox.y).abs();
    if vertical > config.block_tolerance {
        return false;
    }

    match format {
        DocumentFormat::Paged => (prev.bbox.x - next.bbox.x).abs() <= config.horizontal_proximity,
        DocumentFormat::Flowing => lines_related(prev, next),
    }
}

/// Structural relatedness for lines without usable coordinates.
pub fn lines_related(prev: &TextLine, next: &TextLine) -> bool {
    let same_list = prev.is_list_item && next.is_list_item && prev.list_type == next.list_type;
    let close_indent = prev.indent_level.abs_diff(next.indent_level) <= 1;
    let introduces = prev.text.trim_end().ends_with(':');
    let both_markers = prev.list_type.is_some() && next.list_type.is_some();

    same_list || close_indent || introduces || both_markers
}
