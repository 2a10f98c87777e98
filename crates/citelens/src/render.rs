//! Drawable surfaces and the per-surface render scheduler.
//!
//! A page render draws a wireframe of the page (one bar per text line, one
//! outline per block) and then the highlight overlay, all through
//! [`OverlayTransform`] so the overlay lands where the text was drawn.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use citelens_core::{BoundingBox, DrawRect, OverlayTransform, PageLayout};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::document::PageSize;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(255, 255, 255);
    pub const TEXT: Color = Color(120, 120, 120);
    pub const BLOCK: Color = Color(190, 200, 220);
    pub const HIGHLIGHT: Color = Color(255, 221, 0);
    pub const OUTLINE: Color = Color(230, 120, 0);
}

/// Something rectangles can be drawn on, in surface pixels.
pub trait Surface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Color);
    fn fill_rect(&mut self, rect: &DrawRect, color: Color, opacity: f32);
    fn stroke_rect(&mut self, rect: &DrawRect, color: Color, opacity: f32, line_width: u32);
}

/// An in-memory RGBA surface.
pub struct PixelSurface {
    image: RgbaImage,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([255, 255, 255, 255])),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Pixel bounds `[x0, x1) × [y0, y1)` of `rect` inside the surface.
    fn clip(&self, rect: &DrawRect) -> Option<(u32, u32, u32, u32)> {
        let (w, h) = (self.image.width() as f32, self.image.height() as f32);
        let x0 = rect.x.floor().clamp(0.0, w);
        let y0 = rect.y.floor().clamp(0.0, h);
        let x1 = (rect.x + rect.width).ceil().clamp(0.0, w);
        let y1 = (rect.y + rect.height).ceil().clamp(0.0, h);
        (x0 < x1 && y0 < y1).then_some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    fn blend(&mut self, x: u32, y: u32, color: Color, opacity: f32) {
        let alpha = opacity.clamp(0.0, 1.0);
        let px = self.image.get_pixel_mut(x, y);
        let target = [color.0, color.1, color.2];
        for (channel, value) in px.0.iter_mut().take(3).zip(target) {
            *channel = (*channel as f32 * (1.0 - alpha) + value as f32 * alpha).round() as u8;
        }
        px.0[3] = 255;
    }
}

impl Surface for PixelSurface {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self, color: Color) {
        for px in self.image.pixels_mut() {
            *px = Rgba([color.0, color.1, color.2, 255]);
        }
    }

    fn fill_rect(&mut self, rect: &DrawRect, color: Color, opacity: f32) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color, opacity);
            }
        }
    }

    fn stroke_rect(&mut self, rect: &DrawRect, color: Color, opacity: f32, line_width: u32) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        let lw = line_width.max(1);
        for y in y0..y1 {
            for x in x0..x1 {
                let edge = x < x0 + lw || x + lw >= x1 || y < y0 + lw || y + lw >= y1;
                if edge {
                    self.blend(x, y, color, opacity);
                }
            }
        }
    }
}

/// One page wireframe plus an optional highlight.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub page: PageLayout,
    pub size: PageSize,
    pub overlay: OverlayTransform,
    pub highlight: Option<BoundingBox>,
}

impl RenderJob {
    pub fn surface_size(&self) -> (u32, u32) {
        self.overlay.surface_size(self.size.width, self.size.height)
    }

    /// Draw onto `surface`, checking `cancel` between lines.
    /// Returns `false` if the render was cancelled.
    pub fn draw(&self, surface: &mut impl Surface, cancel: &AtomicBool) -> bool {
        let height = surface.size().1 as f32;
        surface.clear(Color::WHITE);

        for block in &self.page.blocks {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            let rect = self.overlay.apply(&block.bbox, height);
            surface.stroke_rect(&rect, Color::BLOCK, 1.0, 1);
        }
        for line in &self.page.lines {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            let rect = self.overlay.apply(&line.bbox, height);
            surface.fill_rect(&rect, Color::TEXT, 0.5);
        }

        if let Some(bbox) = &self.highlight {
            let rect = self.overlay.apply(bbox, height);
            surface.fill_rect(&rect, Color::HIGHLIGHT, 0.4);
            surface.stroke_rect(&rect, Color::OUTLINE, 1.0, 2);
        }
        !cancel.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub enum RenderOutcome {
    Rendered(Vec<u8>),
    /// A newer render for the same surface took over.
    Cancelled,
}

/// Handle on a started render.
#[derive(Debug)]
pub struct RenderTicket {
    surface: String,
    id: u64,
    cancel: Arc<AtomicBool>,
}

impl RenderTicket {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Serializes renders per surface: starting one cancels the pending one.
#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: Mutex<HashMap<String, (u64, Arc<AtomicBool>)>>,
    next: AtomicU64,
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending_map(&self) -> MutexGuard<'_, HashMap<String, (u64, Arc<AtomicBool>)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a render on `surface`, cancelling whatever was pending there.
    pub fn begin(&self, surface: &str) -> RenderTicket {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        let previous = self
            .pending_map()
            .insert(surface.to_string(), (id, cancel.clone()));
        if let Some((previous_id, flag)) = previous {
            log::debug!("surface {surface}: render {id} cancels render {previous_id}");
            flag.store(true, Ordering::SeqCst);
        }
        RenderTicket {
            surface: surface.to_string(),
            id,
            cancel,
        }
    }

    pub fn finish(&self, ticket: &RenderTicket) {
        let mut pending = self.pending_map();
        if matches!(pending.get(&ticket.surface), Some((id, _)) if *id == ticket.id) {
            pending.remove(&ticket.surface);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending_map().len()
    }

    pub async fn render(&self, surface: &str, job: RenderJob) -> Result<RenderOutcome, Error> {
        let ticket = self.begin(surface);
        let cancel = ticket.cancel.clone();

        let drawn = tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, Error> {
            let (width, height) = job.surface_size();
            let mut pixels = PixelSurface::new(width, height);
            if !job.draw(&mut pixels, &cancel) {
                return Ok(None);
            }
            pixels
                .to_png()
                .map(Some)
                .map_err(|e| Error::Task(format!("PNG encoding failed: {e}")))
        })
        .await;
        self.finish(&ticket);

        match drawn?? {
            Some(png) if !ticket.is_cancelled() => Ok(RenderOutcome::Rendered(png)),
            _ => Ok(RenderOutcome::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citelens_core::{segment_document, DocumentFormat, PageUnits, PositionedTextUnit, SegmentConfig};

    fn rect(x: f32, y: f32, width: f32, height: f32) -> DrawRect {
        DrawRect {
            x,
            y,
            width,
            height,
        }
    }

    // =====================================================================
    // pixel surface
    // =====================================================================

    #[test]
    fn test_fill_and_clear() {
        let mut surface = PixelSurface::new(10, 10);
        surface.fill_rect(&rect(2.0, 2.0, 3.0, 3.0), Color(0, 0, 0), 1.0);
        assert_eq!(surface.pixel(3, 3), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(6, 6), [255, 255, 255, 255]);

        surface.clear(Color(10, 20, 30));
        assert_eq!(surface.pixel(3, 3), [10, 20, 30, 255]);
    }

    #[test]
    fn test_fill_blends_with_opacity() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_rect(&rect(0.0, 0.0, 4.0, 4.0), Color(0, 0, 0), 0.5);
        let [r, g, b, a] = surface.pixel(1, 1);
        assert_eq!((r, g, b, a), (128, 128, 128, 255));
    }

    #[test]
    fn test_stroke_leaves_interior() {
        let mut surface = PixelSurface::new(10, 10);
        surface.stroke_rect(&rect(1.0, 1.0, 8.0, 8.0), Color(0, 0, 0), 1.0, 1);
        assert_eq!(surface.pixel(1, 1), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(8, 5), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn test_rects_outside_are_clipped() {
        let mut surface = PixelSurface::new(5, 5);
        surface.fill_rect(&rect(-10.0, -10.0, 12.0, 12.0), Color(0, 0, 0), 1.0);
        surface.fill_rect(&rect(50.0, 50.0, 5.0, 5.0), Color(0, 0, 0), 1.0);
        assert_eq!(surface.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(surface.pixel(2, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn test_png_encoding() {
        let png = PixelSurface::new(3, 2).to_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    // =====================================================================
    // render job
    // =====================================================================

    fn job() -> RenderJob {
        let cfg = SegmentConfig::default();
        let unit = PositionedTextUnit {
            text: "A line of body text long enough".to_string(),
            x: 20.0,
            y: 100.0,
            width: 100.0,
            height: 10.0,
            font_size: Some(10.0),
            indent: 0,
            paragraph: None,
        };
        let layout = segment_document(
            &[PageUnits {
                page: 1,
                units: vec![unit],
            }],
            DocumentFormat::Paged,
            &cfg,
        );
        RenderJob {
            page: layout.pages[0].clone(),
            size: PageSize {
                page: 1,
                width: 200.0,
                height: 200.0,
            },
            overlay: OverlayTransform {
                scale: 1.0,
                offset: 0.0,
            },
            highlight: Some(BoundingBox::new(20.0, 100.0, 100.0, 10.0)),
        }
    }

    #[test]
    fn test_draw_highlight_at_transformed_box() {
        let job = job();
        let (w, h) = job.surface_size();
        assert_eq!((w, h), (200, 200));

        let mut surface = PixelSurface::new(w, h);
        assert!(job.draw(&mut surface, &AtomicBool::new(false)));

        // Box (20, 100, 100, 10) → surface y = 200 − 100 = 100.
        let [r, g, b, _] = surface.pixel(60, 105);
        assert!(r > b && g > b, "expected a yellow tint, got {:?}", (r, g, b));
        assert_eq!(surface.pixel(5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn test_draw_stops_when_cancelled() {
        let mut surface = PixelSurface::new(200, 200);
        assert!(!job().draw(&mut surface, &AtomicBool::new(true)));
    }

    // =====================================================================
    // scheduler
    // =====================================================================

    #[test]
    fn test_new_render_cancels_pending_one_on_same_surface() {
        let scheduler = RenderScheduler::new();
        let first = scheduler.begin("main");
        let other = scheduler.begin("thumbnail");
        let second = scheduler.begin("main");

        assert!(first.is_cancelled());
        assert!(!other.is_cancelled());
        assert!(!second.is_cancelled());

        scheduler.finish(&first);
        assert_eq!(scheduler.pending(), 2);
        scheduler.finish(&second);
        scheduler.finish(&other);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_render_produces_png_and_cancels_stale() {
        let scheduler = RenderScheduler::new();
        let stale = scheduler.begin("main");

        let outcome = scheduler.render("main", job()).await.unwrap();
        assert!(stale.is_cancelled());
        let RenderOutcome::Rendered(png) = outcome else {
            panic!("expected a rendered page");
        };
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(scheduler.pending(), 0);
    }
}
