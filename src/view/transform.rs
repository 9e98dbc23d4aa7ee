//! Pan/zoom mathematics for the slice view.
//!
//! The slice is drawn at `(pan_x, pan_y)` with size
//! `(base_width * zoom, base_height * zoom)`, where the base size fits the
//! canvas while preserving the physical aspect ratio of the slice.

use crate::constants::{MAX_ZOOM, MIN_ZOOM, ZOOM_PRECISION, ZOOM_STEP};

/// Zoom stepping configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub step: f64,
    pub min: f64,
    pub max: f64,
    /// Decimal places the zoom is rounded to after each step
    pub precision: u32,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            step: ZOOM_STEP,
            min: MIN_ZOOM,
            max: MAX_ZOOM,
            precision: ZOOM_PRECISION,
        }
    }
}

impl ZoomLimits {
    /// Next zoom level for a wheel step in `direction` (+1 in, -1 out).
    pub fn step_zoom(&self, zoom: f64, direction: f64) -> f64 {
        let factor = 10f64.powi(self.precision as i32);
        let rounded = ((zoom + self.step * direction) * factor).round() / factor;
        rounded.clamp(self.min, self.max)
    }
}

/// How canvas offsets outside the drawn slice are resolved to voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordMode {
    /// Offsets outside the slice resolve to `None`
    Strict,
    /// Offsets are clamped to the nearest edge voxel
    Clamped,
    /// Unclamped voxel coordinates, possibly negative or past the edge
    Raw,
}

/// Represents pan/zoom transform state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    /// Fitted slice size at zoom 1
    pub base_width: f64,
    pub base_height: f64,
}

impl ViewTransform {
    /// Fit a slice with physical `aspect_ratio` (width / height) into a canvas,
    /// centered, at zoom 1.
    pub fn fit(canvas_width: f64, canvas_height: f64, aspect_ratio: f64) -> Self {
        let pan_x = ((canvas_width - aspect_ratio * canvas_height) / 2.0).max(0.0);
        let pan_y = ((canvas_height - canvas_width / aspect_ratio) / 2.0).max(0.0);
        let base_width = if pan_x > 0.0 {
            aspect_ratio * canvas_height
        } else {
            canvas_width
        };
        let base_height = if pan_y > 0.0 {
            canvas_width / aspect_ratio
        } else {
            canvas_height
        };

        Self {
            zoom: 1.0,
            pan_x,
            pan_y,
            base_width,
            base_height,
        }
    }

    /// Drawn slice width at the current zoom.
    pub fn draw_width(&self) -> f64 {
        self.base_width * self.zoom
    }

    /// Drawn slice height at the current zoom.
    pub fn draw_height(&self) -> f64 {
        self.base_height * self.zoom
    }

    /// Apply a pan delta. Panning is unbounded.
    pub fn pan_by(&self, dx: f64, dy: f64) -> ViewTransform {
        ViewTransform {
            pan_x: self.pan_x + dx,
            pan_y: self.pan_y + dy,
            ..*self
        }
    }

    /// Step the zoom around a pivot so the point under the pivot stays fixed.
    pub fn zoom_at(
        &self,
        pivot_x: f64,
        pivot_y: f64,
        direction: f64,
        limits: &ZoomLimits,
    ) -> ViewTransform {
        let new_zoom = limits.step_zoom(self.zoom, direction);
        let ratio = new_zoom / self.zoom;

        ViewTransform {
            zoom: new_zoom,
            pan_x: pivot_x - (pivot_x - self.pan_x) * ratio,
            pan_y: pivot_y - (pivot_y - self.pan_y) * ratio,
            ..*self
        }
    }

    /// Map a canvas offset to a voxel column/row of a `dim_x` x `dim_y` slice.
    pub fn pixel_to_voxel(
        &self,
        offset_x: f64,
        offset_y: f64,
        dim_x: usize,
        dim_y: usize,
        mode: CoordMode,
    ) -> Option<(i64, i64)> {
        let raw_x = ((offset_x - self.pan_x) * dim_x as f64 / self.draw_width()).floor() as i64;
        let raw_y = ((offset_y - self.pan_y) * dim_y as f64 / self.draw_height()).floor() as i64;
        let clamp = |v: i64, dim: usize| v.clamp(0, dim.saturating_sub(1) as i64);

        match mode {
            CoordMode::Raw => Some((raw_x, raw_y)),
            CoordMode::Clamped => Some((clamp(raw_x, dim_x), clamp(raw_y, dim_y))),
            CoordMode::Strict => {
                let inside_x = offset_x >= self.pan_x && offset_x < self.pan_x + self.draw_width();
                let inside_y = offset_y >= self.pan_y && offset_y < self.pan_y + self.draw_height();
                (inside_x && inside_y).then(|| (clamp(raw_x, dim_x), clamp(raw_y, dim_y)))
            }
        }
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            base_width: 0.0,
            base_height: 0.0,
        }
    }
}
