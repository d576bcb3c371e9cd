//! Strokes and highlighted glyph ranges.

use crate::model::{CrdtId, Pen, PenColor};

/// One sample of a stroke.
///
/// All fields are in the units of point format version 2: `speed` and
/// `width` in quarter units, `direction` and `pressure` scaled to `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub direction: f32,
    pub width: f32,
    pub pressure: f32,
}

/// A single continuous pen movement.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub color: PenColor,
    pub tool: Pen,
    pub thickness_scale: f64,
    pub starting_length: f32,
    pub points: Vec<Point>,
    /// Id of the edit that created the stroke.
    pub timestamp: CrdtId,
    /// Present when the stroke was moved after being drawn.
    pub move_id: Option<CrdtId>,
}

impl Line {
    /// Returns `(min_x, max_x, min_y, max_y)` over all points, or `None` for
    /// an empty stroke.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.points.first()?;
        let init = (first.x, first.x, first.y, first.y);
        Some(self.points.iter().fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p.x), x1.max(p.x), y0.min(p.y), y1.max(p.y))
        }))
    }
}

/// Axis-aligned rectangle covering part of a highlighted glyph range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Highlighted text selected on an underlying document page.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRange {
    /// Character offset of the selection, absent in some firmware versions.
    pub start: Option<u32>,
    pub length: u32,
    pub color: PenColor,
    pub text: String,
    pub rectangles: Vec<Rect>,
}
