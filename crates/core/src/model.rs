//! Shared data model for the segmentation pipeline.
//!
//! ```text
//! RawFragment / paragraph  ->  PositionedTextUnit  ->  TextLine  ->  TextBlock
//!                               (normalize)            (lines)       (blocks, classify)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// The two input shapes the pipeline understands.
///
/// `Paged` sources carry true per-fragment coordinates (bottom-up, PDF style).
/// `Flowing` sources carry only sequential paragraph text; their coordinates
/// are synthesized and grow downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Paged,
    Flowing,
}

impl DocumentFormat {
    pub fn is_paged(&self) -> bool {
        matches!(self, DocumentFormat::Paged)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Paged => write!(f, "paged"),
            DocumentFormat::Flowing => write!(f, "flowing"),
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Axis-aligned box in document space.
///
/// `(x, y)` is the minimum corner, so the same union arithmetic works for
/// bottom-up and top-down coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let top = self.top().max(other.top());
        BoundingBox::new(x, y, right - x, top - y)
    }

    /// Union of every box in `boxes`, `None` when the iterator is empty.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<BoundingBox> {
        boxes.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(a) => Some(a.union(b)),
        })
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.top() <= self.top()
    }

    /// `true` when every edge of `other` lies within `tolerance` of ours.
    pub fn matches(&self, other: &BoundingBox, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// A fragment as delivered by a page text source.
///
/// Only `transform[4]` (x) and `transform[5]` (y) are interpreted; rotation
/// and skew components are carried but ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    pub text: String,
    pub transform: [f32; 6],
    pub width: f32,
    pub height: f32,
}

// ---------------------------------------------------------------------------
// Units, lines, blocks
// ---------------------------------------------------------------------------

/// One atomic piece of extracted text with an origin and a size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedTextUnit {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: Option<f32>,
    /// Leading whitespace count of the source paragraph (flowing input only).
    pub indent: usize,
    /// Index of the source paragraph (flowing input only).
    pub paragraph: Option<usize>,
}

impl PositionedTextUnit {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.width, self.height)
    }
}

/// All units extracted from one page (flowing documents are a single page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageUnits {
    /// 1-based page number.
    pub page: usize,
    pub units: Vec<PositionedTextUnit>,
}

/// Kind of list marker a line starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Numbered,
    Lettered,
    Roman,
    Dash,
}

/// A horizontal line assembled from units sharing a vertical band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub units: Vec<PositionedTextUnit>,
    pub text: String,
    pub bbox: BoundingBox,
    pub page: usize,
    pub font_size: Option<f32>,
    pub paragraph: Option<usize>,
    pub is_list_item: bool,
    pub list_type: Option<ListType>,
    pub indent_level: usize,
}

impl TextLine {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Structural classification of a [`TextBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Paragraph,
    List,
    Table,
    Heading,
    Mixed,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "paragraph",
            BlockType::List => "list",
            BlockType::Table => "table",
            BlockType::Heading => "heading",
            BlockType::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paragraph" => Some(BlockType::Paragraph),
            "list" => Some(BlockType::List),
            "table" => Some(BlockType::Table),
            "heading" => Some(BlockType::Heading),
            "mixed" => Some(BlockType::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A vertical run of related lines; the unit of classification and citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
    pub bbox: BoundingBox,
    pub text: String,
    pub block_type: BlockType,
    pub page: usize,
}

impl TextBlock {
    /// Open a block with `line` as its only member.
    pub fn start(line: TextLine) -> Self {
        Self {
            bbox: line.bbox,
            text: line.text.clone(),
            page: line.page,
            lines: vec![line],
            block_type: BlockType::Paragraph,
        }
    }

    /// Append a line, growing the box and text.
    pub fn push(&mut self, line: TextLine) {
        self.bbox = self.bbox.union(&line.bbox);
        self.text.push('\n');
        self.text.push_str(&line.text);
        self.lines.push(line);
    }

    pub fn last_line(&self) -> &TextLine {
        // A block is never empty: it is created through `start`.
        &self.lines[self.lines.len() - 1]
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
