use serde::{Deserialize, Serialize};

use crate::model::DocumentFormat;

/// Tolerances and thresholds used by every stage of the pipeline.
///
/// All distances are in document units (PDF points for paged input,
/// synthesized units for flowing input).  Missing keys in a deserialized
/// config fall back to [`SegmentConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Vertical bucket size used to merge units into one line.
    pub line_tolerance: f32,
    /// Maximum vertical distance between consecutive lines of one block.
    pub block_tolerance: f32,
    /// Maximum horizontal origin shift between consecutive lines (paged).
    pub horizontal_proximity: f32,
    /// Lines with fewer characters are dropped as page furniture (paged).
    pub min_line_chars_paged: usize,
    /// Same as above for flowing input.
    pub min_line_chars_flowing: usize,
    /// Single-line blocks with a larger font-size proxy are headings (paged).
    pub heading_font_size: f32,
    /// Flowing headings must be shorter than this.
    pub heading_max_chars: usize,
    /// Synthesized distance between consecutive paragraphs (flowing).
    pub flow_line_spacing: f32,
    /// Synthesized line height (flowing).
    pub flow_line_height: f32,
    /// Synthesized per-character advance (flowing).
    pub flow_char_width: f32,
    /// Horizontal distance per indent level (paged).
    pub indent_width: f32,
    /// Edge tolerance when matching a citation box against a line box.
    pub box_match_tolerance: f32,
    /// Minimum length of a citation snippet.
    pub min_snippet_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 2.0,
            block_tolerance: 30.0,
            horizontal_proximity: 100.0,
            min_line_chars_paged: 15,
            min_line_chars_flowing: 1,
            heading_font_size: 14.0,
            heading_max_chars: 100,
            flow_line_spacing: 20.0,
            flow_line_height: 12.0,
            flow_char_width: 6.0,
            indent_width: 20.0,
            box_match_tolerance: 5.0,
            min_snippet_chars: 15,
        }
    }
}

impl SegmentConfig {
    pub fn min_line_chars(&self, format: DocumentFormat) -> usize {
        match format {
            DocumentFormat::Paged => self.min_line_chars_paged,
            DocumentFormat::Flowing => self.min_line_chars_flowing,
        }
    }
}
