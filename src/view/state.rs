//! Per canvas-pair view state.
//!
//! One `ViewState` is shared by the image canvas and the mask canvas of a
//! pair. It is mutated only through the operations below; each returns an
//! [`Invalidation`] describing what the caller must refresh.

use std::collections::BTreeSet;

use crate::constants::DEFAULT_MASK_ALPHA;
use crate::error::{Result, ViewerError};
use crate::view::transform::{CoordMode, ViewTransform, ZoomLimits};
use crate::volume::{AxisCode, AxisMapping, Orientation, VolumeHeader};

// ============================================================================
// Display parameters
// ============================================================================

/// Intensity range mapped to grayscale on the image layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageWindow {
    pub min: f64,
    pub max: f64,
}

impl ImageWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Window centered on `level` spanning `width`, rounded to integers.
    pub fn from_width_level(width: f64, level: f64) -> Self {
        Self {
            min: (level - width / 2.0).round(),
            max: (level + width / 2.0).round(),
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn level(&self) -> f64 {
        (self.max + self.min) / 2.0
    }
}

/// Categorical display parameters of the mask layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskDisplay {
    /// Alpha forced onto every non-zero label
    pub alpha: u8,
    /// Labels drawn with their color; all others render transparent
    pub visible_labels: BTreeSet<u32>,
}

impl MaskDisplay {
    pub fn is_visible(&self, label: u32) -> bool {
        label != 0 && self.visible_labels.contains(&label)
    }
}

/// Interpolation toggle per layer. Off means nearest-neighbor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Smoothing {
    pub image: bool,
    pub mask: bool,
}

/// Parse an alpha given as `0..=255` or as a percentage such as `"50%"`.
///
/// Percentages are scaled to 255; the result is rounded and clamped.
pub fn parse_alpha(input: &str) -> Result<u8> {
    let trimmed = input.trim();
    let invalid = || ViewerError::InvalidAlpha(input.to_string());

    let value = match trimmed.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().map_err(|_| invalid())? * 255.0 / 100.0,
        None => trimmed.parse::<f64>().map_err(|_| invalid())?,
    };
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(value.round().clamp(0.0, 255.0) as u8)
}

// ============================================================================
// Mutation results
// ============================================================================

/// What a `ViewState` mutation requires from the caches and renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Both canvases of the pair must be redrawn
    pub redraw: bool,
    /// Image-layer tag changed; stale entries re-rasterize on next access
    pub image: bool,
    /// Mask-layer coverage must be dropped
    pub mask: bool,
    /// Slice geometry changed; every cached entry of both layers is invalid
    pub rebuild: bool,
}

impl Invalidation {
    /// Nothing changed.
    pub const NONE: Invalidation = Invalidation {
        redraw: false,
        image: false,
        mask: false,
        rebuild: false,
    };

    /// Only the transform changed.
    pub const REDRAW: Invalidation = Invalidation {
        redraw: true,
        image: false,
        mask: false,
        rebuild: false,
    };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Combine two invalidations.
    pub fn merge(self, other: Invalidation) -> Invalidation {
        Invalidation {
            redraw: self.redraw || other.redraw,
            image: self.image || other.image,
            mask: self.mask || other.mask,
            rebuild: self.rebuild || other.rebuild,
        }
    }
}

/// Target of a slice change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStep {
    /// Move relative to the current slice
    Delta(i64),
    /// Jump to a slice index
    Absolute(i64),
}

/// Independent parts of the view that `reset` restores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetFlags {
    /// Restore the header calibration window
    pub window: bool,
    /// Return to the middle slice
    pub slice: bool,
    /// Restore default alpha and make every label visible again
    pub color_map: bool,
    /// Return to the orientation the volume was opened in
    pub orientation: bool,
}

impl ResetFlags {
    pub fn all() -> Self {
        Self {
            window: true,
            slice: true,
            color_map: true,
            orientation: true,
        }
    }
}

/// Resolves canvas offsets to voxel coordinates of the displayed slice.
pub trait CoordResolver {
    fn pixel_to_voxel(&self, offset_x: f64, offset_y: f64, mode: CoordMode) -> Option<(i64, i64)>;
}

// ============================================================================
// ViewState
// ============================================================================

/// Transform, slice and display state of one image+mask canvas pair.
#[derive(Debug, Clone)]
pub struct ViewState {
    axis_code: AxisCode,
    dims: [usize; 3],
    spacing: [f64; 3],
    orientation: Orientation,
    initial_orientation: Orientation,
    mapping: AxisMapping,
    slice: usize,
    transform: ViewTransform,
    limits: ZoomLimits,
    canvas_width: f64,
    canvas_height: f64,
    window: ImageWindow,
    calibrated_window: ImageWindow,
    mask: MaskDisplay,
    default_mask: MaskDisplay,
    smoothing: Smoothing,
}

impl ViewState {
    /// Create the view for a volume, shown in its initial orientation at
    /// the middle slice with the calibration window.
    pub fn new(
        header: &VolumeHeader,
        canvas_width: f64,
        canvas_height: f64,
        labels: impl IntoIterator<Item = u32>,
    ) -> Self {
        let orientation = header.axis_code.initial_orientation();
        let mapping = AxisMapping::resolve(orientation, &header.axis_code);
        let window = ImageWindow::new(header.cal_min, header.cal_max);
        let mask = MaskDisplay {
            alpha: DEFAULT_MASK_ALPHA,
            visible_labels: labels.into_iter().filter(|&l| l != 0).collect(),
        };

        let mut state = Self {
            axis_code: header.axis_code,
            dims: header.dims,
            spacing: header.spacing,
            orientation,
            initial_orientation: orientation,
            mapping,
            slice: mapping.depth(&header.dims) / 2,
            transform: ViewTransform::default(),
            limits: ZoomLimits::default(),
            canvas_width,
            canvas_height,
            window,
            calibrated_window: window,
            default_mask: mask.clone(),
            mask,
            smoothing: Smoothing::default(),
        };
        state.reset_view();
        state
    }

    /// Override the zoom stepping configuration.
    pub fn with_zoom_limits(mut self, limits: ZoomLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Override the default mask alpha.
    pub fn with_default_alpha(mut self, alpha: u8) -> Self {
        self.mask.alpha = alpha;
        self.default_mask.alpha = alpha;
        self
    }

    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn mapping(&self) -> AxisMapping {
        self.mapping
    }

    pub fn slice(&self) -> usize {
        self.slice
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn zoom(&self) -> f64 {
        self.transform.zoom
    }

    pub fn window(&self) -> ImageWindow {
        self.window
    }

    pub fn mask_display(&self) -> &MaskDisplay {
        &self.mask
    }

    pub fn smoothing(&self) -> Smoothing {
        self.smoothing
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        (self.canvas_width, self.canvas_height)
    }

    /// Width of the displayed slice in voxels.
    pub fn slice_width(&self) -> usize {
        self.mapping.fast_dim(&self.dims)
    }

    /// Height of the displayed slice in voxels.
    pub fn slice_height(&self) -> usize {
        self.mapping.slow_dim(&self.dims)
    }

    /// Number of slices in the current orientation.
    pub fn depth(&self) -> usize {
        self.mapping.depth(&self.dims)
    }

    /// Physical width / height of the displayed slice.
    pub fn aspect_ratio(&self) -> f64 {
        let width = self.spacing[self.mapping.fast] * self.slice_width() as f64;
        let height = self.spacing[self.mapping.slow] * self.slice_height() as f64;
        if height > 0.0 { width / height } else { 1.0 }
    }

    // ------------------------------------------------------------------------
    // Transform
    // ------------------------------------------------------------------------

    /// Fit the slice to the canvas, centered, at zoom 1.
    pub fn reset_view(&mut self) -> Invalidation {
        self.transform = ViewTransform::fit(self.canvas_width, self.canvas_height, self.aspect_ratio());
        Invalidation::REDRAW
    }

    /// Move the slice by a canvas-pixel delta.
    pub fn pan(&mut self, dx: f64, dy: f64) -> Invalidation {
        self.transform = self.transform.pan_by(dx, dy);
        Invalidation::REDRAW
    }

    /// Zoom one step around a canvas pivot.
    pub fn scale(&mut self, pivot_x: f64, pivot_y: f64, direction: f64) -> Invalidation {
        let next = self.transform.zoom_at(pivot_x, pivot_y, direction, &self.limits);
        if next == self.transform {
            return Invalidation::NONE;
        }
        self.transform = next;
        Invalidation::REDRAW
    }

    /// Canvas element resized: refit the slice.
    pub fn resize_canvas(&mut self, width: f64, height: f64) -> Invalidation {
        self.canvas_width = width;
        self.canvas_height = height;
        self.reset_view()
    }

    // ------------------------------------------------------------------------
    // Slice and orientation
    // ------------------------------------------------------------------------

    /// Move to another slice, clamped to `[0, depth)`.
    ///
    /// Staying on the current slice is a no-op.
    pub fn change_slice(&mut self, step: SliceStep) -> Invalidation {
        let last = self.depth().saturating_sub(1) as i64;
        let target = match step {
            SliceStep::Delta(delta) => self.slice as i64 + delta,
            SliceStep::Absolute(index) => index,
        }
        .clamp(0, last) as usize;

        if target == self.slice {
            return Invalidation::NONE;
        }
        log::debug!("Slice {} -> {}", self.slice, target);
        self.slice = target;
        Invalidation::REDRAW
    }

    /// Show the volume in another orientation at its middle slice.
    pub fn set_orientation(&mut self, orientation: Orientation) -> Invalidation {
        if orientation == self.orientation {
            return Invalidation::NONE;
        }
        log::info!("Orientation {} -> {}", self.orientation.name(), orientation.name());

        self.orientation = orientation;
        self.mapping = AxisMapping::resolve(orientation, &self.axis_code);
        self.slice = self.depth() / 2;
        self.reset_view().merge(Invalidation {
            rebuild: true,
            image: true,
            mask: true,
            ..Invalidation::NONE
        })
    }

    /// Advance axial -> sagittal -> coronal -> axial.
    pub fn cycle_orientation(&mut self) -> Invalidation {
        self.set_orientation(self.orientation.next())
    }

    // ------------------------------------------------------------------------
    // Display parameters
    // ------------------------------------------------------------------------

    /// Set the intensity window. An empty window (`max == min`) is ignored.
    pub fn set_window(&mut self, min: f64, max: f64) -> Invalidation {
        if max == min {
            return Invalidation::NONE;
        }
        let window = ImageWindow::new(min, max);
        if window == self.window {
            return Invalidation::NONE;
        }
        self.window = window;
        Invalidation {
            image: true,
            ..Invalidation::REDRAW
        }
    }

    /// Set the intensity window from width and level.
    pub fn set_window_width_level(&mut self, width: f64, level: f64) -> Invalidation {
        let window = ImageWindow::from_width_level(width, level);
        self.set_window(window.min, window.max)
    }

    /// Set the alpha of non-zero labels. Unchanged alpha is a no-op.
    pub fn set_alpha(&mut self, alpha: u8) -> Invalidation {
        if alpha == self.mask.alpha {
            return Invalidation::NONE;
        }
        self.mask.alpha = alpha;
        Invalidation {
            mask: true,
            ..Invalidation::REDRAW
        }
    }

    /// Show or hide one label on the mask layer.
    pub fn set_label_visible(&mut self, label: u32, visible: bool) -> Invalidation {
        let changed = if visible {
            label != 0 && self.mask.visible_labels.insert(label)
        } else {
            self.mask.visible_labels.remove(&label)
        };
        if !changed {
            return Invalidation::NONE;
        }
        Invalidation {
            mask: true,
            ..Invalidation::REDRAW
        }
    }

    /// Flip interpolation on the selected layers.
    pub fn toggle_smoothing(&mut self, image: bool, mask: bool) -> Invalidation {
        if !image && !mask {
            return Invalidation::NONE;
        }
        self.smoothing.image ^= image;
        self.smoothing.mask ^= mask;
        Invalidation::REDRAW
    }

    /// Restore the fit plus the parts selected by `flags`.
    pub fn reset(&mut self, flags: ResetFlags) -> Invalidation {
        let mut result = Invalidation::NONE;

        if flags.orientation {
            result = result.merge(self.set_orientation(self.initial_orientation));
        }
        if flags.slice {
            result = result.merge(self.change_slice(SliceStep::Absolute((self.depth() / 2) as i64)));
        }
        if flags.window {
            let cal = self.calibrated_window;
            result = result.merge(self.set_window(cal.min, cal.max));
        }
        if flags.color_map && self.mask != self.default_mask {
            self.mask = self.default_mask.clone();
            result = result.merge(Invalidation {
                mask: true,
                ..Invalidation::REDRAW
            });
        }

        result.merge(self.reset_view())
    }
}

impl CoordResolver for ViewState {
    fn pixel_to_voxel(&self, offset_x: f64, offset_y: f64, mode: CoordMode) -> Option<(i64, i64)> {
        self.transform.pixel_to_voxel(
            offset_x,
            offset_y,
            self.slice_width(),
            self.slice_height(),
            mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Datatype;

    fn state(dims: [usize; 3]) -> ViewState {
        let header = VolumeHeader::new(dims, Datatype::I16).with_cal_range(-100.0, 300.0);
        ViewState::new(&header, 200.0, 100.0, [1, 2, 3])
    }

    #[test]
    fn test_initial_state() {
        let view = state([10, 10, 4]);
        assert_eq!(view.orientation(), Orientation::Axial);
        assert_eq!(view.slice(), 2);
        assert_eq!(view.window(), ImageWindow::new(-100.0, 300.0));
        assert_eq!(view.zoom(), 1.0);
        assert_eq!(view.transform().pan_x, 50.0);
        assert_eq!(view.mask_display().alpha, DEFAULT_MASK_ALPHA);
    }

    #[test]
    fn test_aspect_ratio_uses_spacing() {
        let header = VolumeHeader::new([10, 20, 4], Datatype::U8).with_spacing([2.0, 0.5, 1.0]);
        let view = ViewState::new(&header, 100.0, 100.0, []);
        assert_eq!(view.aspect_ratio(), 2.0);
        assert_eq!(view.transform().base_width, 100.0);
        assert_eq!(view.transform().base_height, 50.0);
    }

    #[test]
    fn test_change_slice_to_same_is_noop() {
        let mut view = state([10, 10, 4]);
        assert!(view.change_slice(SliceStep::Absolute(2)).is_none());
        assert!(view.change_slice(SliceStep::Delta(0)).is_none());
    }

    #[test]
    fn test_change_slice_clamps() {
        let mut view = state([10, 10, 4]);
        assert!(view.change_slice(SliceStep::Delta(10)).redraw);
        assert_eq!(view.slice(), 3);
        assert!(view.change_slice(SliceStep::Delta(1)).is_none());
        view.change_slice(SliceStep::Absolute(-5));
        assert_eq!(view.slice(), 0);
    }

    #[test]
    fn test_set_window_empty_is_noop() {
        let mut view = state([10, 10, 4]);
        assert!(view.set_window(50.0, 50.0).is_none());
        assert_eq!(view.window(), ImageWindow::new(-100.0, 300.0));

        let inv = view.set_window(0.0, 100.0);
        assert!(inv.image && inv.redraw && !inv.mask);
    }

    #[test]
    fn test_window_width_level() {
        let mut view = state([10, 10, 4]);
        view.set_window_width_level(400.0, 40.0);
        assert_eq!(view.window(), ImageWindow::new(-160.0, 240.0));
        assert_eq!(view.window().level(), 40.0);
    }

    #[test]
    fn test_parse_alpha() {
        assert_eq!(parse_alpha("128").unwrap(), 128);
        assert_eq!(parse_alpha("50%").unwrap(), 128);
        assert_eq!(parse_alpha("100 %").unwrap(), 255);
        assert_eq!(parse_alpha("400").unwrap(), 255);
        assert_eq!(parse_alpha("-3").unwrap(), 0);
        assert!(parse_alpha("half").is_err());
    }

    #[test]
    fn test_set_alpha_unchanged_is_noop() {
        let mut view = state([10, 10, 4]);
        assert!(view.set_alpha(DEFAULT_MASK_ALPHA).is_none());
        let inv = view.set_alpha(128);
        assert!(inv.mask && !inv.image);
    }

    #[test]
    fn test_label_visibility() {
        let mut view = state([10, 10, 4]);
        assert!(view.mask_display().is_visible(2));
        assert!(view.set_label_visible(2, false).mask);
        assert!(!view.mask_display().is_visible(2));
        assert!(view.set_label_visible(2, false).is_none());
        assert!(view.set_label_visible(0, true).is_none());
    }

    #[test]
    fn test_orientation_cycle_rebuilds() {
        let mut view = state([10, 20, 4]);
        let inv = view.cycle_orientation();
        assert!(inv.rebuild && inv.redraw);
        assert_eq!(view.orientation(), Orientation::Sagittal);
        assert_eq!((view.slice_width(), view.slice_height(), view.depth()), (20, 4, 10));
        assert_eq!(view.slice(), 5);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut view = state([10, 10, 4]);
        view.cycle_orientation();
        view.change_slice(SliceStep::Delta(3));
        view.set_window(0.0, 1.0);
        view.set_alpha(10);
        view.pan(30.0, 30.0);

        let inv = view.reset(ResetFlags::all());
        assert!(inv.rebuild && inv.image && inv.mask);
        assert_eq!(view.orientation(), Orientation::Axial);
        assert_eq!(view.slice(), 2);
        assert_eq!(view.window(), ImageWindow::new(-100.0, 300.0));
        assert_eq!(view.mask_display().alpha, DEFAULT_MASK_ALPHA);
        assert_eq!(view.transform().pan_x, 50.0);
    }

    #[test]
    fn test_scale_then_inverse() {
        let mut view = state([10, 10, 4]);
        let before = *view.transform();
        view.scale(120.0, 30.0, 1.0);
        view.scale(120.0, 30.0, -1.0);
        assert_eq!(view.zoom(), before.zoom);
        assert!((view.transform().pan_x - before.pan_x).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_to_voxel_follows_transform() {
        let mut view = state([10, 10, 4]);
        assert_eq!(view.pixel_to_voxel(50.0, 0.0, CoordMode::Strict), Some((0, 0)));
        assert_eq!(view.pixel_to_voxel(0.0, 0.0, CoordMode::Strict), None);
        view.pan(-50.0, 0.0);
        assert_eq!(view.pixel_to_voxel(0.0, 0.0, CoordMode::Strict), Some((0, 0)));
    }
}
