//! Core library for citelens
//!
//! This crate implements the **Functional Core** of citelens: every step that
//! turns extracted document text into classified blocks, samples citations
//! from them and resolves a citation back to a highlight region.
//!
//! # Architecture Overview
//!
//! - **`citelens_core`** (this crate): pure transformations, zero I/O
//! - **`pdf`** / **`docx`**: the page and flow text sources
//! - **`citelens`**: loading, caching, rendering and serving (the Imperative Shell)
//!
//! ## Pipeline
//!
//! ```text
//! fragments / paragraphs
//!     -> normalize  (PositionedTextUnit)
//!     -> lines      (TextLine, per page)
//!     -> blocks     (TextBlock, per page)
//!     -> classify   (paragraph | list | table | heading | mixed)
//!     -> snippet    (candidates) -> sample -> citations
//!
//! citation -> relocate (context window + region) -> transform (surface rect)
//! ```
//!
//! # Module Organization
//!
//! - [`model`]: units, lines, blocks and geometry
//! - [`config`]: tolerances and thresholds
//! - [`normalize`], [`lines`], [`blocks`], [`classify`], [`segment`]: segmentation
//! - [`snippet`], [`sample`]: citation candidates and sampling
//! - [`relocate`]: coordinate lookup and fuzzy text search
//! - [`transform`]: document space to surface space
//! - [`query`]: navigation query encoding
//!
//! # Example Usage
//!
//! ```rust
//! use citelens_core::{segment_text, BlockType, SegmentConfig};
//!
//! let layout = segment_text("Steps:\n- one\n- two", &SegmentConfig::default());
//! let block = layout.blocks().next().unwrap();
//! assert_eq!(block.block_type, BlockType::List);
//! ```

pub mod blocks;
pub mod classify;
pub mod config;
pub mod lines;
pub mod markers;
pub mod model;
pub mod normalize;
pub mod query;
pub mod relocate;
pub mod sample;
pub mod segment;
pub mod snippet;
pub mod transform;

pub use config::SegmentConfig;
pub use model::{
    BlockType, BoundingBox, DocumentFormat, ListType, PageUnits, PositionedTextUnit, RawFragment,
    TextBlock, TextLine,
};
pub use query::{HighlightQuery, QueryError};
pub use relocate::{ContextWindow, HighlightRegion, Relocation};
pub use segment::{segment_document, segment_page, segment_text, DocumentLayout, PageLayout};
pub use snippet::{Anchor, Citation, CitationId, Snippet, SnippetSource};
pub use transform::{DrawRect, OverlayTransform};

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // end to end
    // =====================================================================

    #[test]
    fn test_flowing_document_end_to_end() {
        let cfg = SegmentConfig::default();
        let layout = segment_text(
            "Intro: see list below:\n\n- item one. - item two.\n\nThe results were   consistent across runs.",
            &cfg,
        );

        let types: Vec<BlockType> = layout.blocks().map(|b| b.block_type).collect();
        assert_eq!(
            types,
            vec![BlockType::Heading, BlockType::List, BlockType::Paragraph]
        );

        let snippets = snippet::candidates(&layout, SnippetSource::Blocks, &cfg);
        let picked = sample::sample(&snippets, 10);
        assert_eq!(picked.len(), snippets.len());

        let citations = snippet::make_citations(picked, chrono::Utc::now());
        let lines: Vec<TextLine> = layout.lines().cloned().collect();
        for citation in &citations {
            let found = relocate::relocate_snippet(&citation.snippet, &lines, &cfg);
            assert!(!found.is_miss(), "lost {:?}", citation.text);
            assert_eq!(found.context.highlight, 1);
        }

        let q = HighlightQuery::parse("file=doc.txt&text=results+WERE+consistent").unwrap();
        let HighlightQuery::Flowing { text, .. } = q else {
            panic!("expected flowing query");
        };
        let hit = relocate::relocate_flowing(&lines, Some(&text), None);
        assert_eq!(hit.context.highlighted(), "results were   consistent");
    }

    #[test]
    fn test_paged_document_end_to_end() {
        let cfg = SegmentConfig::default();
        let fragments = vec![
            RawFragment {
                text: "Chapter One Overview".to_string(),
                transform: [18.0, 0.0, 0.0, 18.0, 72.0, 720.0],
                width: 200.0,
                height: 18.0,
            },
            RawFragment {
                text: "The committee met on a".to_string(),
                transform: [11.0, 0.0, 0.0, 11.0, 72.0, 680.0],
                width: 150.0,
                height: 11.0,
            },
            RawFragment {
                text: "rainy Tuesday afternoon.".to_string(),
                transform: [11.0, 0.0, 0.0, 11.0, 72.0, 667.0],
                width: 160.0,
                height: 11.0,
            },
        ];
        let page = PageUnits {
            page: 1,
            units: normalize::units_from_fragments(&fragments),
        };
        let layout = segment_document(&[page], DocumentFormat::Paged, &cfg);
        let blocks: Vec<&TextBlock> = layout.blocks().collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_type, BlockType::Heading);
        assert_eq!(blocks[1].block_type, BlockType::Paragraph);

        let snippets = snippet::candidates(&layout, SnippetSource::Lines, &cfg);
        let citations = snippet::make_citations(snippets, chrono::Utc::now());
        let page_lines = &layout.page(1).unwrap().lines;

        let second = &citations[1];
        let found = relocate::relocate_snippet(&second.snippet, page_lines, &cfg);
        assert_eq!(found.context.highlighted(), "The committee met on a");
        assert_eq!(found.context.rows.len(), 3);

        let Some(HighlightRegion::Box { bbox, .. }) = found.region else {
            panic!("paged relocation must yield a box");
        };
        let rect = OverlayTransform::default().apply(&bbox, 792.0 * 1.5);
        assert_eq!(rect.x, 108.0);
        assert_eq!(rect.y, 1188.0 - 680.0 * 1.5 - 12.0);
    }
}
