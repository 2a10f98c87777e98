//! The single open document and everything derived from it.
//!
//! Opening a document samples its citations once; they stay fixed until a
//! different document replaces it. Line indexes used for relocation are
//! cached per `(document, page)` and evicted together with their document.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use citelens_core::relocate::{relocate_flowing, relocate_paged, relocate_snippet};
use citelens_core::sample::sample;
use citelens_core::snippet::{candidates, make_citations};
use citelens_core::{
    Anchor, BoundingBox, Citation, DocumentFormat, DrawRect, HighlightQuery,
    HighlightRegion, OverlayTransform, Relocation, SegmentConfig, TextLine,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::cache::{CacheKey, InFlightCache};
use crate::config::{AppConfig, SamplingConfig};
use crate::document::{DocumentId, LoadedDocument, Loader};
use crate::error::Error;
use crate::render::RenderJob;

#[derive(Debug, Serialize)]
pub struct OpenDocument {
    pub document: LoadedDocument,
    pub citations: Vec<Citation>,
}

impl OpenDocument {
    pub fn citation(&self, id: &str) -> Option<&Citation> {
        self.citations.iter().find(|c| c.id.as_str() == id)
    }

    /// Navigation query that leads back to `citation`.
    pub fn link(&self, citation: &Citation) -> HighlightQuery {
        HighlightQuery::for_citation(&self.document.name, citation)
    }
}

/// A relocation plus, for paged documents, where to draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located {
    pub document: DocumentId,
    #[serde(flatten)]
    pub relocation: Relocation,
    pub overlay: Option<DrawRect>,
    /// Surface size the overlay was computed for.
    pub surface: Option<(u32, u32)>,
}

pub struct Session {
    loader: Loader,
    sampling: SamplingConfig,
    overlay: OverlayTransform,
    current: RwLock<Option<Arc<OpenDocument>>>,
    documents: InFlightCache<Arc<OpenDocument>>,
    lines: InFlightCache<Arc<Vec<TextLine>>>,
    last_run: Arc<AtomicI64>,
}

/// Creation time for a sampling run, strictly later than the previous run's
/// so citation ids stay unique within the session.
fn run_timestamp(last_run: &AtomicI64) -> DateTime<Utc> {
    let now = Utc::now().timestamp_millis();
    let previous = last_run
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    let stamp = now.max(previous + 1);
    DateTime::from_timestamp_millis(stamp).unwrap_or_else(Utc::now)
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            loader: Loader::new(config.segment.clone()),
            sampling: config.sampling,
            overlay: config.overlay,
            current: RwLock::new(None),
            documents: InFlightCache::new(),
            lines: InFlightCache::new(),
            last_run: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn overlay(&self) -> OverlayTransform {
        self.overlay
    }

    fn segment_config(&self) -> &SegmentConfig {
        self.loader.config()
    }

    /// Open `bytes` as the current document.
    ///
    /// Identical bytes reuse the open document and its citations, and
    /// overlapping opens of the same bytes share one extraction. Anything
    /// else replaces the open document and evicts everything cached for it.
    pub async fn open(&self, name: &str, bytes: impl Into<Arc<[u8]>>) -> Result<Arc<OpenDocument>, Error> {
        let bytes = bytes.into();
        let id = DocumentId::of(&bytes);
        if let Some(open) = self.current().await {
            if open.document.id == id {
                log::info!("{name} is already open as {id}");
                return Ok(open);
            }
        }

        let loader = self.loader.clone();
        let sampling = self.sampling;
        let last_run = self.last_run.clone();
        let name = name.to_string();
        let open = self
            .documents
            .get_or_compute(CacheKey::document(id.clone()), move || async move {
                let document = loader.load(&name, bytes).await?;
                let pool = candidates(&document.layout, sampling.source, loader.config());
                let picked = sample(&pool, sampling.count);
                log::debug!("sampled {} of {} candidates", picked.len(), pool.len());
                let citations = make_citations(picked, run_timestamp(&last_run));
                Ok(Arc::new(OpenDocument {
                    document,
                    citations,
                }))
            })
            .await?;

        let mut current = self.current.write().await;
        match current.as_ref() {
            Some(installed) if installed.document.id == id => return Ok(installed.clone()),
            Some(previous) => {
                let evicted = self.lines.evict(&previous.document.id)
                    + self.documents.evict(&previous.document.id);
                log::debug!(
                    "replaced {} with {id}, evicted {evicted} entries",
                    previous.document.id
                );
            }
            None => {}
        }
        *current = Some(open.clone());
        Ok(open)
    }

    pub async fn current(&self) -> Option<Arc<OpenDocument>> {
        self.current.read().await.clone()
    }

    async fn require(&self) -> Result<Arc<OpenDocument>, Error> {
        self.current().await.ok_or(Error::NoDocument)
    }

    pub async fn citations(&self) -> Result<Vec<Citation>, Error> {
        Ok(self.require().await?.citations.clone())
    }

    /// Lines of one page, or of the whole document when `page` is `None`.
    pub async fn line_index(
        &self,
        open: &Arc<OpenDocument>,
        page: Option<usize>,
    ) -> Result<Arc<Vec<TextLine>>, Error> {
        let id = open.document.id.clone();
        let key = match page {
            Some(page) => CacheKey::page(id, page),
            None => CacheKey::document(id),
        };
        let open = open.clone();
        self.lines
            .get_or_compute(key, move || async move {
                let layout = &open.document.layout;
                match page {
                    Some(page) => layout
                        .page(page)
                        .map(|p| Arc::new(p.lines.clone()))
                        .ok_or(Error::PageNotFound(page)),
                    None => Ok(Arc::new(layout.lines().cloned().collect())),
                }
            })
            .await
    }

    pub fn cached_indexes(&self) -> usize {
        self.lines.len()
    }

    pub async fn relocate_citation(&self, id: &str) -> Result<Located, Error> {
        let open = self.require().await?;
        let citation = open
            .citation(id)
            .ok_or_else(|| Error::UnknownCitation(id.to_string()))?;
        let page = match citation.snippet.anchor() {
            Anchor::Paged { page, .. } => Some(*page),
            Anchor::Flowing { .. } => None,
        };
        let lines = self.line_index(&open, page).await?;
        let relocation = relocate_snippet(&citation.snippet, &lines, self.segment_config());
        Ok(self.locate(&open, relocation))
    }

    /// Resolve a navigation query against the open document.
    pub async fn resolve(&self, query: &HighlightQuery) -> Result<Located, Error> {
        let open = self.require().await?;
        if query.file() != open.document.name {
            return Err(Error::NotOpen(query.file().to_string()));
        }

        let relocation = match (query, open.document.format()) {
            (HighlightQuery::Paged { page, bbox, .. }, DocumentFormat::Paged) => {
                let lines = self.line_index(&open, Some(*page)).await?;
                relocate_paged(&lines, *page, bbox, self.segment_config())
            }
            (HighlightQuery::Flowing { text, .. }, DocumentFormat::Flowing) => {
                let lines = self.line_index(&open, None).await?;
                relocate_flowing(&lines, Some(text), None)
            }
            (_, format) => {
                return Err(Error::Query(format!(
                    "query shape does not match a {format:?} document"
                )))
            }
        };
        Ok(self.locate(&open, relocation))
    }

    fn locate(&self, open: &OpenDocument, relocation: Relocation) -> Located {
        let placed = match &relocation.region {
            Some(HighlightRegion::Box { page, bbox }) => open.document.page_size(*page).map(|size| {
                let (width, height) = self.overlay.surface_size(size.width, size.height);
                (self.overlay.apply(bbox, height as f32), (width, height))
            }),
            _ => None,
        };
        Located {
            document: open.document.id.clone(),
            relocation,
            overlay: placed.map(|(rect, _)| rect),
            surface: placed.map(|(_, size)| size),
        }
    }

    /// Wireframe render of `page` with an optional highlight box.
    pub async fn render_job(&self, page: usize, highlight: Option<BoundingBox>) -> Result<RenderJob, Error> {
        let open = self.require().await?;
        if open.document.format() != DocumentFormat::Paged {
            return Err(Error::Query("only paged documents can be rendered".to_string()));
        }
        let size = open.document.page_size(page).ok_or(Error::PageNotFound(page))?;
        let layout = open
            .document
            .layout
            .page(page)
            .cloned()
            .ok_or(Error::PageNotFound(page))?;
        Ok(RenderJob {
            page: layout,
            size,
            overlay: self.overlay,
            highlight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::report_pdf;
    use citelens_core::SnippetSource;

    const NOTES: &str = "Shopping list for the weekend:\n\n- eggs from the farm\n- milk and cheese\n\nThe results were   consistent across runs.";

    fn session(count: usize, source: SnippetSource) -> Session {
        let mut config = AppConfig::default();
        config.sampling = SamplingConfig { count, source };
        Session::new(&config)
    }

    // =====================================================================
    // open / replace
    // =====================================================================

    #[tokio::test]
    async fn test_open_samples_bounded_citations() {
        let session = session(2, SnippetSource::Blocks);
        let open = session.open("notes.txt", NOTES.as_bytes()).await.unwrap();
        assert_eq!(open.citations.len(), 2);
        assert_eq!(session.citations().await.unwrap(), open.citations);
    }

    #[tokio::test]
    async fn test_reopen_identical_bytes_reuses_document() {
        let session = session(5, SnippetSource::Blocks);
        let first = session.open("notes.txt", NOTES.as_bytes()).await.unwrap();
        let again = session.open("notes.txt", NOTES.as_bytes()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[tokio::test]
    async fn test_overlapping_opens_share_one_extraction() {
        let session = session(5, SnippetSource::Lines);
        let bytes: Arc<[u8]> = Arc::from(report_pdf());
        let (a, b) = tokio::join!(
            session.open("report.pdf", bytes.clone()),
            session.open("report.pdf", bytes.clone())
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));

        let current = session.current().await.unwrap();
        assert!(Arc::ptr_eq(&current, &a));
        for citation in &a.citations {
            assert!(session.relocate_citation(citation.id.as_str()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_cached_indexes() {
        let session = session(5, SnippetSource::Blocks);
        let open = session.open("notes.txt", NOTES.as_bytes()).await.unwrap();
        session.relocate_citation(open.citations[0].id.as_str()).await.unwrap();
        assert_eq!(session.cached_indexes(), 1);

        let (a, b) = tokio::join!(
            session.open("notes.txt", NOTES.as_bytes()),
            session.open("notes.txt", NOTES.as_bytes())
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &open));
        assert!(Arc::ptr_eq(&b.unwrap(), &open));
        assert_eq!(session.cached_indexes(), 1);
    }

    #[tokio::test]
    async fn test_replacing_document_evicts_its_indexes() {
        let session = session(5, SnippetSource::Blocks);
        let open = session.open("notes.txt", NOTES.as_bytes()).await.unwrap();
        let id = open.citations[0].id.to_string();
        session.relocate_citation(&id).await.unwrap();
        assert_eq!(session.cached_indexes(), 1);

        session.open("report.pdf", report_pdf()).await.unwrap();
        assert_eq!(session.cached_indexes(), 0);
        assert!(matches!(
            session.relocate_citation(&id).await,
            Err(Error::UnknownCitation(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_document_has_no_citations() {
        let session = session(5, SnippetSource::Lines);
        let open = session.open("empty.txt", "   \n\n".as_bytes()).await.unwrap();
        assert!(open.citations.is_empty());
    }

    #[tokio::test]
    async fn test_requires_open_document() {
        let session = session(5, SnippetSource::Lines);
        assert_eq!(session.citations().await, Err(Error::NoDocument));
        let query = HighlightQuery::parse("file=a.txt&text=hello").unwrap();
        assert_eq!(session.resolve(&query).await, Err(Error::NoDocument));
    }

    // =====================================================================
    // relocation
    // =====================================================================

    #[tokio::test]
    async fn test_every_flowing_citation_relocates() {
        let session = session(10, SnippetSource::Blocks);
        let open = session.open("notes.txt", NOTES.as_bytes()).await.unwrap();
        for citation in &open.citations {
            let located = session.relocate_citation(citation.id.as_str()).await.unwrap();
            assert!(!located.relocation.is_miss(), "lost {:?}", citation.text);
            assert_eq!(located.overlay, None);
        }
    }

    #[tokio::test]
    async fn test_every_paged_citation_has_overlay() {
        let session = session(10, SnippetSource::Lines);
        let open = session.open("report.pdf", report_pdf()).await.unwrap();
        assert!(!open.citations.is_empty());
        for citation in &open.citations {
            let located = session.relocate_citation(citation.id.as_str()).await.unwrap();
            assert!(!located.relocation.context.is_not_found());
            assert_eq!(located.surface, Some((918, 1188)));
            assert!(located.overlay.is_some());
        }
    }

    #[tokio::test]
    async fn test_resolve_flowing_query() {
        let session = session(5, SnippetSource::Blocks);
        session.open("notes.txt", NOTES.as_bytes()).await.unwrap();

        let query = HighlightQuery::parse("file=notes.txt&text=%22results+WERE+consistent%22").unwrap();
        let located = session.resolve(&query).await.unwrap();
        assert_eq!(located.relocation.context.highlighted(), "results were   consistent");

        let query = HighlightQuery::parse("file=notes.txt&text=nowhere+to+be+found").unwrap();
        let located = session.resolve(&query).await.unwrap();
        assert!(located.relocation.is_miss());
    }

    #[tokio::test]
    async fn test_resolve_paged_query() {
        let session = session(5, SnippetSource::Lines);
        session.open("report.pdf", report_pdf()).await.unwrap();

        let query = HighlightQuery::parse("file=report.pdf&page=1&x=72&y=680&width=200&height=11").unwrap();
        let located = session.resolve(&query).await.unwrap();
        assert_eq!(
            located.relocation.context.highlighted(),
            "Revenue grew steadily across all regions."
        );
        assert_eq!(located.relocation.context.rows.len(), 3);
        let overlay = located.overlay.unwrap();
        assert_eq!(overlay.x, 108.0);
        assert_eq!(overlay.y, 1188.0 - 680.0 * 1.5 - 12.0);
    }

    #[tokio::test]
    async fn test_resolve_rejects_other_file_and_shape() {
        let session = session(5, SnippetSource::Lines);
        session.open("report.pdf", report_pdf()).await.unwrap();

        let other = HighlightQuery::parse("file=other.pdf&page=1&x=0&y=0&width=1&height=1").unwrap();
        assert_eq!(
            session.resolve(&other).await,
            Err(Error::NotOpen("other.pdf".to_string()))
        );

        let flowing = HighlightQuery::parse("file=report.pdf&text=revenue").unwrap();
        assert!(matches!(session.resolve(&flowing).await, Err(Error::Query(_))));

        let missing = HighlightQuery::parse("file=report.pdf&page=9&x=0&y=0&width=1&height=1").unwrap();
        assert_eq!(session.resolve(&missing).await, Err(Error::PageNotFound(9)));
    }

    #[tokio::test]
    async fn test_render_job_for_page() {
        let session = session(5, SnippetSource::Lines);
        session.open("report.pdf", report_pdf()).await.unwrap();
        let job = session.render_job(2, None).await.unwrap();
        assert_eq!(job.page.page, 2);
        assert_eq!(job.surface_size(), (918, 1188));
        assert!(matches!(session.render_job(3, None).await, Err(Error::PageNotFound(3))));
    }
}
