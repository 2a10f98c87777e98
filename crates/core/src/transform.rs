//! Document space → drawable surface space.
//!
//! Paged documents are bottom-up (origin bottom-left); surfaces are top-down.
//! With scale `s`, offset `o` and surface height `H`:
//!
//! ```text
//! drawX = x·s    drawY = H − y·s − o·s    drawW = w·s    drawH = h·s
//! ```
//!
//! The offset is an empirical calibration for the gap between a glyph run's
//! baseline and its visible box.

use serde::{Deserialize, Serialize};

use crate::model::BoundingBox;

pub const DEFAULT_SCALE: f32 = 1.5;
pub const DEFAULT_OFFSET: f32 = 8.0;

/// A rectangle in surface pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn to_surface(bbox: &BoundingBox, scale: f32, surface_height: f32, offset: f32) -> DrawRect {
    DrawRect {
        x: bbox.x * scale,
        y: surface_height - bbox.y * scale - offset * scale,
        width: bbox.width * scale,
        height: bbox.height * scale,
    }
}

/// Scale and calibration offset used to draw overlays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayTransform {
    pub scale: f32,
    pub offset: f32,
}

impl Default for OverlayTransform {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            offset: DEFAULT_OFFSET,
        }
    }
}

impl OverlayTransform {
    pub fn apply(&self, bbox: &BoundingBox, surface_height: f32) -> DrawRect {
        to_surface(bbox, self.scale, surface_height, self.offset)
    }

    /// Surface size needed to show a page of the given size.
    pub fn surface_size(&self, page_width: f32, page_height: f32) -> (u32, u32) {
        (
            (page_width * self.scale).ceil().max(1.0) as u32,
            (page_height * self.scale).ceil().max(1.0) as u32,
        )
    }
}
