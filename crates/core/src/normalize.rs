//! Positioned unit normalizer.
//!
//! Turns the two heterogeneous input shapes into one uniform
//! [`PositionedTextUnit`] sequence so later stages never branch on where the
//! text came from.

use crate::config::SegmentConfig;
use crate::model::{PositionedTextUnit, RawFragment};

/// Convert positioned fragments from a page text source into units.
///
/// Fragments whose trimmed text is empty are dropped.  The fragment height
/// doubles as a font-size proxy.
pub fn units_from_fragments(fragments: &[RawFragment]) -> Vec<PositionedTextUnit> {
    fragments
        .iter()
        .filter_map(|frag| {
            let text = frag.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(PositionedTextUnit {
                text: text.to_string(),
                x: frag.transform[4],
                y: frag.transform[5],
                width: frag.width,
                height: frag.height,
                font_size: Some(frag.height),
                indent: 0,
                paragraph: None,
            })
        })
        .collect()
}

/// Convert plain paragraph strings into synthesized units.
///
/// The paragraph index drives `y`, so blank paragraphs still advance the
/// vertical position and later act as block separators.
pub fn units_from_paragraphs<S: AsRef<str>>(
    paragraphs: &[S],
    config: &SegmentConfig,
) -> Vec<PositionedTextUnit> {
    paragraphs
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let raw = raw.as_ref();
            let text = raw.trim();
            if text.is_empty() {
                return None;
            }
            let chars = text.chars().count() as f32;
            Some(PositionedTextUnit {
                text: text.to_string(),
                x: 0.0,
                y: index as f32 * config.flow_line_spacing,
                width: chars * config.flow_char_width,
                height: config.flow_line_height,
                font_size: None,
                indent: leading_indent(raw),
                paragraph: Some(index),
            })
        })
        .collect()
}

/// Split extracted flow text into paragraphs (one per line) and normalize.
pub fn units_from_text(text: &str, config: &SegmentConfig) -> Vec<PositionedTextUnit> {
    let paragraphs: Vec<&str> = text.lines().collect();
    units_from_paragraphs(&paragraphs, config)
}

/// Leading whitespace width: spaces count one, tabs count two.
fn leading_indent(raw: &str) -> usize {
    raw.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str, x: f32, y: f32) -> RawFragment {
        RawFragment {
            text: text.to_string(),
            transform: [1.0, 0.0, 0.0, 1.0, x, y],
            width: text.len() as f32 * 5.0,
            height: 10.0,
        }
    }

    #[test]
    fn test_fragments_take_translation_components() {
        let units = units_from_fragments(&[fragment("Hello", 72.0, 700.0)]);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].x, 72.0);
        assert_eq!(units[0].y, 700.0);
        assert_eq!(units[0].font_size, Some(10.0));
        assert_eq!(units[0].paragraph, None);
    }

    #[test]
    fn test_fragments_blank_text_filtered() {
        let units = units_from_fragments(&[
            fragment("   ", 0.0, 0.0),
            fragment("", 0.0, 0.0),
            fragment("  kept  ", 0.0, 0.0),
        ]);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "kept");
    }

    #[test]
    fn test_paragraphs_synthesize_coordinates() {
        let cfg = SegmentConfig::default();
        let units = units_from_paragraphs(&["first", "", "    third"], &cfg);
        assert_eq!(units.len(), 2);

        assert_eq!(units[0].y, 0.0);
        assert_eq!(units[0].x, 0.0);
        assert_eq!(units[0].width, 5.0 * cfg.flow_char_width);
        assert_eq!(units[0].height, cfg.flow_line_height);

        assert_eq!(units[1].paragraph, Some(2));
        assert_eq!(units[1].y, 2.0 * cfg.flow_line_spacing);
        assert_eq!(units[1].indent, 4);
        assert_eq!(units[1].text, "third");
    }

    #[test]
    fn test_text_splits_on_newlines() {
        let cfg = SegmentConfig::default();
        let units = units_from_text("alpha\r\nbeta\n\ngamma", &cfg);
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta", "gamma"]);
        assert_eq!(units[2].paragraph, Some(3));
    }

    #[test]
    fn test_leading_indent_counts_tabs_double() {
        assert_eq!(leading_indent("\t  x"), 4);
        assert_eq!(leading_indent("x"), 0);
    }
}
