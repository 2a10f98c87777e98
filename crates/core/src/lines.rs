//! Line grouper: units sharing a vertical band become one [`TextLine`].
//!
//! Paged units are bucketed by `round(y / line_tolerance)` which absorbs
//! baseline jitter between glyph runs that sit on one visual line.  Flowing
//! units are already one-per-paragraph, so each becomes its own line; the
//! output shape is the same either way.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::config::SegmentConfig;
use crate::markers::detect_list_marker;
use crate::model::{BoundingBox, DocumentFormat, PositionedTextUnit, TextLine};

/// Group the units of one page into lines ordered top-to-bottom.
///
/// Lines shorter than the format's minimum character count are dropped.
pub fn group_units_into_lines(
    units: &[PositionedTextUnit],
    page: usize,
    format: DocumentFormat,
    config: &SegmentConfig,
) -> Vec<TextLine> {
    let groups: Vec<Vec<PositionedTextUnit>> = match format {
        DocumentFormat::Paged => bucket_by_baseline(units, config.line_tolerance),
        DocumentFormat::Flowing => {
            let mut sorted: Vec<&PositionedTextUnit> = units.iter().collect();
            sorted.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal));
            sorted.into_iter().map(|u| vec![u.clone()]).collect()
        }
    };

    let min_chars = config.min_line_chars(format);

    groups
        .into_iter()
        .filter_map(|group| assemble_line(group, page, format, config))
        .filter(|line| line.char_count() >= min_chars)
        .collect()
}

/// Bucket paged units by rounded baseline; buckets come out top of page first.
fn bucket_by_baseline(
    units: &[PositionedTextUnit],
    tolerance: f32,
) -> Vec<Vec<PositionedTextUnit>> {
    let tolerance = if tolerance > 0.0 { tolerance } else { 1.0 };
    let mut buckets: BTreeMap<i64, Vec<PositionedTextUnit>> = BTreeMap::new();

    for unit in units {
        let key = (unit.y / tolerance).round() as i64;
        buckets.entry(key).or_default().push(unit.clone());
    }

    // PDF space grows upwards, so the highest bucket is the top line.
    buckets.into_values().rev().collect()
}

/// Build one line from units known to share a band.
fn assemble_line(
    mut units: Vec<PositionedTextUnit>,
    page: usize,
    format: DocumentFormat,
    config: &SegmentConfig,
) -> Option<TextLine> {
    units.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

    let boxes: Vec<BoundingBox> = units.iter().map(PositionedTextUnit::bbox).collect();
    let bbox = BoundingBox::union_all(&boxes)?;

    let text = units
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let list_type = detect_list_marker(&text, format);
    let indent_level = match format {
        DocumentFormat::Paged => {
            if config.indent_width > 0.0 {
                (bbox.x.max(0.0) / config.indent_width).floor() as usize
            } else {
                0
            }
        }
        DocumentFormat::Flowing => units.first().map(|u| u.indent / 2).unwrap_or(0),
    };

    Some(TextLine {
        font_size: dominant_font_size(&units),
        paragraph: units.first().and_then(|u| u.paragraph),
        units,
        text,
        bbox,
        page,
        is_list_item: list_type.is_some(),
        list_type,
        indent_level,
    })
}

/// The font size covering the most characters, `None` for flowing input.
fn dominant_font_size(units: &[PositionedTextUnit]) -> Option<f32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for unit in units {
        if let Some(size) = unit.font_size {
            let key = (size * 100.0).round() as i32;
            *counts.entry(key).or_insert(0) += unit.text.chars().count();
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(key, _)| key as f32 / 100.0)
}
