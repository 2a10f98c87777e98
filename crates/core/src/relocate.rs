//! Citation relocator.
//!
//! Resolves a citation back to a highlight region plus a short context
//! window.  Paged citations already carry their box, so only the context has
//! to be found.  Flowing citations carry text only and are found by a
//! normalized substring search over the document's lines.
//!
//! A miss is never an error: it produces [`ContextWindow::not_found`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::config::SegmentConfig;
use crate::model::{BoundingBox, TextLine};
use crate::snippet::{Anchor, Snippet};

pub const NOT_FOUND: &str = "not found";

/// Rows of text around a relocated citation; `rows[highlight]` is the hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub rows: Vec<String>,
    pub highlight: usize,
}

impl ContextWindow {
    pub fn not_found() -> Self {
        Self {
            rows: vec![NOT_FOUND.to_string()],
            highlight: 0,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.rows.len() == 1 && self.rows[0] == NOT_FOUND
    }

    pub fn highlighted(&self) -> &str {
        self.rows.get(self.highlight).map(String::as_str).unwrap_or("")
    }
}

/// The part of the document to draw attention to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HighlightRegion {
    /// A box on a page, in document space.
    Box { page: usize, bbox: BoundingBox },
    /// A byte range inside one flowing line.
    Span {
        line: usize,
        paragraph: Option<usize>,
        start: usize,
        end: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relocation {
    pub region: Option<HighlightRegion>,
    pub context: ContextWindow,
}

impl Relocation {
    pub fn miss() -> Self {
        Self {
            region: None,
            context: ContextWindow::not_found(),
        }
    }

    pub fn is_miss(&self) -> bool {
        self.region.is_none() && self.context.is_not_found()
    }
}

/// Relocate a snippet against the lines it may live in.
///
/// For paged snippets `lines` must be the lines of the anchor's page; for
/// flowing snippets, every line of the document.
pub fn relocate_snippet(snippet: &Snippet, lines: &[TextLine], config: &SegmentConfig) -> Relocation {
    match snippet.anchor() {
        Anchor::Paged { page, bbox } => relocate_paged(lines, *page, bbox, config),
        Anchor::Flowing { paragraph } => {
            relocate_flowing(lines, Some(snippet.text()), Some(*paragraph))
        }
    }
}

// ---------------------------------------------------------------------------
// Paged
// ---------------------------------------------------------------------------

pub fn relocate_paged(
    lines: &[TextLine],
    page: usize,
    bbox: &BoundingBox,
    config: &SegmentConfig,
) -> Relocation {
    Relocation {
        region: Some(HighlightRegion::Box { page, bbox: *bbox }),
        context: paged_context(lines, bbox, config.box_match_tolerance),
    }
}

/// Index of the line whose box matches `target`, else the vertically nearest.
pub fn find_line_by_box(lines: &[TextLine], target: &BoundingBox, tolerance: f32) -> Option<usize> {
    if let Some(index) = lines.iter().position(|l| l.bbox.matches(target, tolerance)) {
        return Some(index);
    }

    lines
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = (a.bbox.top() - target.top()).abs();
            let db = (b.bbox.top() - target.top()).abs();
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        })
        .map(|(index, _)| index)
}

/// `[above, target, below]` with the target highlighted.
///
/// Always three rows.  Without a line above the window becomes
/// `[target, below, ""]` and the highlight moves to 0.  A missing line below
/// is an empty row.
pub fn paged_context(lines: &[TextLine], target: &BoundingBox, tolerance: f32) -> ContextWindow {
    let Some(index) = find_line_by_box(lines, target, tolerance) else {
        return ContextWindow::not_found();
    };

    let current = lines[index].text.clone();
    let below = lines
        .get(index + 1)
        .map(|l| l.text.clone())
        .unwrap_or_default();

    if index == 0 {
        ContextWindow {
            rows: vec![current, below, String::new()],
            highlight: 0,
        }
    } else {
        ContextWindow {
            rows: vec![lines[index - 1].text.clone(), current, below],
            highlight: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Flowing
// ---------------------------------------------------------------------------

/// Text search first, paragraph index as the fallback when there is no text.
pub fn relocate_flowing(lines: &[TextLine], text: Option<&str>, paragraph: Option<usize>) -> Relocation {
    let text = text.map(str::trim).filter(|t| !t.is_empty());

    match (text, paragraph) {
        (Some(text), _) => match search_with_fallback(lines, text) {
            Some(hit) => {
                let line = &lines[hit.line];
                Relocation {
                    region: Some(HighlightRegion::Span {
                        line: hit.line,
                        paragraph: line.paragraph,
                        start: hit.start,
                        end: hit.end,
                    }),
                    context: split_context(&line.text, hit.start, hit.end),
                }
            }
            None => Relocation::miss(),
        },
        (None, Some(paragraph)) => paragraph_relocation(lines, paragraph),
        (None, None) => Relocation::miss(),
    }
}

/// Full text first; multi-line targets then retry with their first line.
fn search_with_fallback(lines: &[TextLine], text: &str) -> Option<TextMatch> {
    search_lines(lines, text).or_else(|| {
        let first = text.lines().map(str::trim).find(|l| !l.is_empty())?;
        if first.len() == text.len() {
            return None;
        }
        search_lines(lines, first)
    })
}

fn paragraph_relocation(lines: &[TextLine], paragraph: usize) -> Relocation {
    let Some(index) = lines.iter().position(|l| l.paragraph == Some(paragraph)) else {
        return Relocation::miss();
    };
    let line = &lines[index];
    Relocation {
        region: Some(HighlightRegion::Span {
            line: index,
            paragraph: line.paragraph,
            start: 0,
            end: line.text.len(),
        }),
        context: paragraph_context(lines, index),
    }
}

/// `[before, target, after]` around the line at `index`, empty rows at the edges.
pub fn paragraph_context(lines: &[TextLine], index: usize) -> ContextWindow {
    let Some(line) = lines.get(index) else {
        return ContextWindow::not_found();
    };
    let before = index
        .checked_sub(1)
        .and_then(|i| lines.get(i))
        .map(|l| l.text.clone())
        .unwrap_or_default();
    let after = lines
        .get(index + 1)
        .map(|l| l.text.clone())
        .unwrap_or_default();

    ContextWindow {
        rows: vec![before, line.text.clone(), after],
        highlight: 1,
    }
}

/// Split a line around a byte range into `[before, match, after]`.
pub fn split_context(line: &str, start: usize, end: usize) -> ContextWindow {
    ContextWindow {
        rows: vec![
            line[..start].trim().to_string(),
            line[start..end].to_string(),
            line[end..].trim().to_string(),
        ],
        highlight: 1,
    }
}

/// A hit: line index plus byte range in that line's original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// First line whose normalized text contains the normalized `target`.
pub fn search_lines(lines: &[TextLine], target: &str) -> Option<TextMatch> {
    let needle = NormalizedText::new(target);
    if needle.text.is_empty() {
        return None;
    }

    lines.iter().enumerate().find_map(|(index, line)| {
        let haystack = NormalizedText::new(&line.text);
        let (start, end) = haystack.find(&needle.text)?;
        Some(TextMatch {
            line: index,
            start,
            end,
        })
    })
}

/// Search-normalized text with a map back into the source string.
///
/// Normalization trims whitespace and wrapping quotes, applies NFKC, folds
/// case and collapses whitespace runs to one space.  `spans[i]` is the byte
/// range in the source that produced the `i`th normalized char.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    spans: Vec<(usize, usize)>,
}

const QUOTES: &[char] = &[
    '"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{00AB}', '\u{00BB}',
];

fn is_trimmable(c: char) -> bool {
    c.is_whitespace() || QUOTES.contains(&c)
}

impl NormalizedText {
    pub fn new(source: &str) -> Self {
        let trimmed = source.trim_start_matches(is_trimmable);
        let offset = source.len() - trimmed.len();
        let trimmed = trimmed.trim_end_matches(is_trimmable);

        let mut text = String::with_capacity(trimmed.len());
        let mut spans = Vec::with_capacity(trimmed.len());
        let mut last_space = true;

        for (rel, original) in trimmed.char_indices() {
            let start = offset + rel;
            let end = start + original.len_utf8();

            for folded in std::iter::once(original).nfkc().flat_map(char::to_lowercase) {
                if folded.is_whitespace() {
                    if !last_space {
                        text.push(' ');
                        spans.push((start, end));
                        last_space = true;
                    }
                } else {
                    text.push(folded);
                    spans.push((start, end));
                    last_space = false;
                }
            }
        }

        if text.ends_with(' ') {
            text.pop();
            spans.pop();
        }

        Self { text, spans }
    }

    /// Find `needle` (already normalized) and return the matching source byte range.
    pub fn find(&self, needle: &str) -> Option<(usize, usize)> {
        if needle.is_empty() {
            return None;
        }
        let byte = self.text.find(needle)?;
        let first = self.text[..byte].chars().count();
        let count = needle.chars().count();
        let start = self.spans.get(first)?.0;
        let end = self.spans.get(first + count - 1)?.1;
        Some((start, end))
    }
}
