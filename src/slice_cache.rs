//! Per-slice rendered image cache.
//!
//! Each layer keeps one rasterized image per slice index, tagged with the
//! view parameters it was rendered from. An entry is reused while its tag
//! matches the current view and is re-rasterized synchronously otherwise.

use image::RgbaImage;
use std::collections::{HashMap, HashSet};

use crate::color::{ColorTable, Rgba};
use crate::error::Result;
use crate::view::{ImageWindow, Invalidation, MaskDisplay, ViewState};
use crate::volume::{Orientation, VolumeBuffer, read_slice};

// ============================================================================
// Rasterization
// ============================================================================

/// Map one intensity to an 8-bit gray level through `window`.
pub fn gray_level(value: f64, window: ImageWindow) -> u8 {
    let span = window.max - window.min;
    if span == 0.0 {
        return 0;
    }
    ((value - window.min) / span * 255.0).clamp(0.0, 255.0).round() as u8
}

/// Rasterize an intensity slice to opaque grayscale.
pub fn rasterize_intensity(
    volume: &VolumeBuffer,
    orientation: Orientation,
    slice: usize,
    window: ImageWindow,
) -> Result<RgbaImage> {
    let cursor = read_slice(volume, orientation, slice)?;
    let (width, height) = (cursor.width() as u32, cursor.height() as u32);

    let mut pixels = Vec::with_capacity(cursor.len() * 4);
    for value in cursor {
        let g = gray_level(value, window);
        pixels.extend_from_slice(&[g, g, g, 0xFF]);
    }
    Ok(to_image(width, height, pixels))
}

/// Rasterize a label slice through the color table.
///
/// Label 0, unknown labels and hidden labels are transparent black; every
/// other label gets its table color with alpha forced to `display.alpha`.
pub fn rasterize_labels(
    volume: &VolumeBuffer,
    orientation: Orientation,
    slice: usize,
    table: &ColorTable,
    display: &MaskDisplay,
) -> Result<RgbaImage> {
    let cursor = read_slice(volume, orientation, slice)?;
    let (width, height) = (cursor.width() as u32, cursor.height() as u32);

    let mut pixels = Vec::with_capacity(cursor.len() * 4);
    for value in cursor {
        let label = value as u32;
        let color = if display.is_visible(label) && table.contains(label) {
            table.color(label).with_alpha(display.alpha)
        } else {
            Rgba::TRANSPARENT
        };
        pixels.extend_from_slice(&[color.r, color.g, color.b, color.a]);
    }
    Ok(to_image(width, height, pixels))
}

fn to_image(width: u32, height: u32, pixels: Vec<u8>) -> RgbaImage {
    // Length is width * height * 4 by construction of the cursor.
    RgbaImage::from_raw(width, height, pixels).unwrap_or_else(|| RgbaImage::new(width, height))
}

// ============================================================================
// Layer caches
// ============================================================================

/// View parameters a cached image was rendered from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerTag {
    Image(ImageWindow),
    Mask { alpha: u8 },
}

struct ImageEntry {
    window: ImageWindow,
    image: RgbaImage,
}

/// Grayscale images of the intensity volume, tagged by window.
#[derive(Default)]
pub struct ImageLayerCache {
    entries: HashMap<usize, ImageEntry>,
    render_count: usize,
}

impl ImageLayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered image of the current slice, re-rasterized only when the
    /// window differs from the cached entry's.
    pub fn get_or_render(&mut self, volume: &VolumeBuffer, view: &ViewState) -> Result<&RgbaImage> {
        let slice = view.slice();
        let window = view.window();

        let fresh = self
            .entries
            .get(&slice)
            .is_some_and(|entry| entry.window == window);
        if !fresh {
            let image = rasterize_intensity(volume, view.orientation(), slice, window)?;
            self.render_count += 1;
            log::debug!(
                "Rasterized image slice {} with window [{}, {}]",
                slice,
                window.min,
                window.max
            );
            self.entries.insert(slice, ImageEntry { window, image });
        }

        Ok(&self.entries[&slice].image)
    }

    /// Store an image rendered elsewhere.
    pub fn insert(&mut self, slice: usize, window: ImageWindow, image: RgbaImage) {
        self.entries.insert(slice, ImageEntry { window, image });
    }

    /// Whether `slice` has an entry rendered with `window`.
    pub fn is_fresh(&self, slice: usize, window: ImageWindow) -> bool {
        self.entries
            .get(&slice)
            .is_some_and(|entry| entry.window == window)
    }

    /// Number of rasterizations performed so far.
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

struct MaskEntry {
    alpha: u8,
    image: RgbaImage,
}

/// Colored images of the label volume.
///
/// An entry is valid while its alpha matches and its slice is in the
/// covered set. Label writes and visibility changes shrink the covered set.
#[derive(Default)]
pub struct MaskLayerCache {
    entries: HashMap<usize, MaskEntry>,
    covered: HashSet<usize>,
    render_count: usize,
}

impl MaskLayerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_render(
        &mut self,
        labels: &VolumeBuffer,
        view: &ViewState,
        table: &ColorTable,
    ) -> Result<&RgbaImage> {
        let slice = view.slice();
        let display = view.mask_display();

        if !self.is_fresh(slice, display.alpha) {
            let image = rasterize_labels(labels, view.orientation(), slice, table, display)?;
            self.render_count += 1;
            log::debug!("Rasterized mask slice {} with alpha {}", slice, display.alpha);
            self.insert(slice, display.alpha, image);
        }

        Ok(&self.entries[&slice].image)
    }

    /// Store an image rendered elsewhere and mark its slice covered.
    pub fn insert(&mut self, slice: usize, alpha: u8, image: RgbaImage) {
        self.entries.insert(slice, MaskEntry { alpha, image });
        self.covered.insert(slice);
    }

    pub fn is_fresh(&self, slice: usize, alpha: u8) -> bool {
        self.covered.contains(&slice)
            && self
                .entries
                .get(&slice)
                .is_some_and(|entry| entry.alpha == alpha)
    }

    /// Force `slice` to re-rasterize on next access.
    pub fn invalidate_slice(&mut self, slice: usize) {
        self.covered.remove(&slice);
    }

    /// Force every slice to re-rasterize on next access.
    pub fn clear_coverage(&mut self) {
        self.covered.clear();
    }

    pub fn render_count(&self) -> usize {
        self.render_count
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.covered.clear();
    }
}

// ============================================================================
// Paired cache
// ============================================================================

/// Image and mask caches of one canvas pair.
///
/// `generation` advances on every invalidation so results rendered from an
/// older snapshot can be recognized and dropped.
#[derive(Default)]
pub struct SliceCache {
    pub image: ImageLayerCache,
    pub mask: MaskLayerCache,
    generation: u64,
}

impl SliceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply the cache side of a view mutation.
    pub fn apply(&mut self, invalidation: Invalidation) {
        if invalidation.rebuild {
            self.clear();
            return;
        }
        if invalidation.image || invalidation.mask {
            self.generation += 1;
        }
        if invalidation.mask {
            self.mask.clear_coverage();
        }
    }

    /// A label slice was rewritten.
    pub fn invalidate_mask_slice(&mut self, slice: usize) {
        self.generation += 1;
        self.mask.invalidate_slice(slice);
    }

    /// Drop every entry of both layers.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.image.clear();
        self.mask.clear();
    }

    /// Accept a slice rendered in the background.
    ///
    /// The image is stored only if it was rendered at the current generation
    /// with the tag the view currently requires, and the slot is not already
    /// fresh. Returns whether it was stored.
    pub fn insert_prerendered(
        &mut self,
        slice: usize,
        tag: LayerTag,
        generation: u64,
        image: RgbaImage,
        view: &ViewState,
    ) -> bool {
        if generation != self.generation {
            log::debug!("Dropping prerendered slice {} from generation {}", slice, generation);
            return false;
        }

        match tag {
            LayerTag::Image(window) => {
                if window != view.window() || self.image.is_fresh(slice, window) {
                    return false;
                }
                self.image.insert(slice, window, image);
            }
            LayerTag::Mask { alpha } => {
                if alpha != view.mask_display().alpha || self.mask.is_fresh(slice, alpha) {
                    return false;
                }
                self.mask.insert(slice, alpha, image);
            }
        }
        true
    }
}
