//! Citation candidates and the citations built from a sample of them.
//!
//! A snippet is an immutable view of one line (`single-line`) or one block
//! (`multi-line`).  Both shapes carry an [`Anchor`] saying how to find them
//! again: a page and box for paged input, a paragraph index for flowing
//! input.  The serialized form is an explicit tagged union:
//!
//! ```json
//! { "kind": "single-line", "text": "...", "anchor": { "format": "paged", "page": 2, "bbox": { ... } } }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SegmentConfig;
use crate::model::{BlockType, BoundingBox, DocumentFormat, TextBlock, TextLine};
use crate::segment::DocumentLayout;

/// Where a snippet lives in its source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum Anchor {
    Paged { page: usize, bbox: BoundingBox },
    Flowing { paragraph: usize },
}

impl Anchor {
    pub fn format(&self) -> DocumentFormat {
        match self {
            Anchor::Paged { .. } => DocumentFormat::Paged,
            Anchor::Flowing { .. } => DocumentFormat::Flowing,
        }
    }

    fn for_line(line: &TextLine, format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::Paged => Anchor::Paged {
                page: line.page,
                bbox: line.bbox,
            },
            DocumentFormat::Flowing => Anchor::Flowing {
                paragraph: line.paragraph.unwrap_or_default(),
            },
        }
    }

    fn for_block(block: &TextBlock, format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::Paged => Anchor::Paged {
                page: block.page,
                bbox: block.bbox,
            },
            DocumentFormat::Flowing => Anchor::Flowing {
                paragraph: block.lines[0].paragraph.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSnippet {
    pub text: String,
    pub anchor: Anchor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLineTextSnippet {
    /// Block text, lines joined with `\n`.
    pub text: String,
    pub lines: Vec<String>,
    pub block_type: BlockType,
    pub anchor: Anchor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Snippet {
    SingleLine(TextSnippet),
    MultiLine(MultiLineTextSnippet),
}

impl Snippet {
    pub fn text(&self) -> &str {
        match self {
            Snippet::SingleLine(s) => &s.text,
            Snippet::MultiLine(s) => &s.text,
        }
    }

    pub fn anchor(&self) -> &Anchor {
        match self {
            Snippet::SingleLine(s) => &s.anchor,
            Snippet::MultiLine(s) => &s.anchor,
        }
    }

    pub fn format(&self) -> DocumentFormat {
        self.anchor().format()
    }

    /// Structural type of the underlying block; lines have none.
    pub fn block_type(&self) -> Option<BlockType> {
        match self {
            Snippet::SingleLine(_) => None,
            Snippet::MultiLine(s) => Some(s.block_type),
        }
    }

    /// First line of the snippet's text.
    pub fn first_line(&self) -> &str {
        match self {
            Snippet::SingleLine(s) => &s.text,
            Snippet::MultiLine(s) => s.lines.first().map(String::as_str).unwrap_or(&s.text),
        }
    }
}

/// Which structural level the sampler draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetSource {
    Lines,
    #[default]
    Blocks,
}

impl std::str::FromStr for SnippetSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lines" => Ok(SnippetSource::Lines),
            "blocks" => Ok(SnippetSource::Blocks),
            other => Err(format!("unknown snippet source: {other}")),
        }
    }
}

/// Every eligible snippet of a document, in document order.
pub fn candidates(
    layout: &DocumentLayout,
    source: SnippetSource,
    config: &SegmentConfig,
) -> Vec<Snippet> {
    let min = config.min_snippet_chars;
    match source {
        SnippetSource::Lines => layout
            .lines()
            .filter(|l| l.char_count() >= min)
            .map(|l| {
                Snippet::SingleLine(TextSnippet {
                    text: l.text.clone(),
                    anchor: Anchor::for_line(l, layout.format),
                })
            })
            .collect(),
        SnippetSource::Blocks => layout
            .blocks()
            .filter(|b| b.char_count() >= min)
            .map(|b| {
                Snippet::MultiLine(MultiLineTextSnippet {
                    text: b.text.clone(),
                    lines: b.lines.iter().map(|l| l.text.clone()).collect(),
                    block_type: b.block_type,
                    anchor: Anchor::for_block(b, layout.format),
                })
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Citations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationId(pub String);

impl CitationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: CitationId,
    pub text: String,
    pub snippet: Snippet,
}

/// Turn one sampling run into citations.
///
/// Ids combine the position in the run with the run's creation time.  Runs
/// with distinct timestamps never hand out the same id.
pub fn make_citations(snippets: Vec<Snippet>, created_at: DateTime<Utc>) -> Vec<Citation> {
    let stamp = created_at.timestamp_millis();
    snippets
        .into_iter()
        .enumerate()
        .map(|(index, snippet)| Citation {
            id: CitationId(format!("c{index}-{stamp}")),
            text: snippet.text().to_string(),
            snippet,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;
    use crate::segment::segment_text;

    fn flowing_layout() -> DocumentLayout {
        segment_text(
            "Methods:\n\nWe measured the response of every sensor twice.\n\nok",
            &SegmentConfig::default(),
        )
    }

    #[test]
    fn test_short_candidates_filtered() {
        let layout = flowing_layout();
        let lines = candidates(&layout, SnippetSource::Lines, &SegmentConfig::default());
        let texts: Vec<&str> = lines.iter().map(Snippet::text).collect();
        assert_eq!(texts, vec!["We measured the response of every sensor twice."]);
    }

    #[test]
    fn test_block_candidates_carry_type_and_paragraph() {
        let layout = segment_text(
            "Introduction to the topic:\n- first point here\n- second point here",
            &SegmentConfig::default(),
        );
        let snippets = candidates(&layout, SnippetSource::Blocks, &SegmentConfig::default());
        assert_eq!(snippets.len(), 1);

        match &snippets[0] {
            Snippet::MultiLine(m) => {
                assert_eq!(m.block_type, BlockType::List);
                assert_eq!(m.lines.len(), 3);
                assert_eq!(m.anchor, Anchor::Flowing { paragraph: 0 });
            }
            other => panic!("expected multi-line snippet, got {other:?}"),
        }
    }

    #[test]
    fn test_snippet_serializes_tagged() {
        let snippet = Snippet::SingleLine(TextSnippet {
            text: "hello world, long enough".to_string(),
            anchor: Anchor::Paged {
                page: 2,
                bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            },
        });
        let json = serde_json::to_value(&snippet).unwrap();
        assert_eq!(json["kind"], "single-line");
        assert_eq!(json["anchor"]["format"], "paged");
        assert_eq!(json["anchor"]["page"], 2);

        let back: Snippet = serde_json::from_value(json).unwrap();
        assert_eq!(back, snippet);
    }

    #[test]
    fn test_multi_line_kind_tag() {
        let snippet = Snippet::MultiLine(MultiLineTextSnippet {
            text: "a\nb".to_string(),
            lines: vec!["a".to_string(), "b".to_string()],
            block_type: BlockType::Table,
            anchor: Anchor::Flowing { paragraph: 4 },
        });
        let json = serde_json::to_value(&snippet).unwrap();
        assert_eq!(json["kind"], "multi-line");
        assert_eq!(json["block_type"], "table");
        assert_eq!(json["anchor"]["format"], "flowing");
        assert_eq!(snippet.first_line(), "a");
    }

    #[test]
    fn test_citation_ids_unique_within_and_across_runs() {
        let layout = flowing_layout();
        let snippets = candidates(&layout, SnippetSource::Blocks, &SegmentConfig::default());

        let t1 = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let t2 = Utc.timestamp_millis_opt(1_700_000_000_001).unwrap();
        let run1 = make_citations(snippets.clone(), t1);
        let run2 = make_citations(snippets, t2);

        let ids: HashSet<&CitationId> = run1.iter().chain(run2.iter()).map(|c| &c.id).collect();
        assert_eq!(ids.len(), run1.len() + run2.len());
        assert_eq!(run1[0].id.as_str(), "c0-1700000000000");
        assert_eq!(run1[0].text, run1[0].snippet.text());
    }

    #[test]
    fn test_snippet_source_from_str() {
        assert_eq!("LINES".parse::<SnippetSource>(), Ok(SnippetSource::Lines));
        assert!("pages".parse::<SnippetSource>().is_err());
    }
}
