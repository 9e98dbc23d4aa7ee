//! Owner of one image+mask canvas pair.
//!
//! Every view mutation goes through here so the cache side of its
//! [`Invalidation`] is applied and a single draw is scheduled for the pair.

use image::RgbaImage;
use std::sync::Arc;

use crate::color::ColorTable;
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::render::{CanvasPair, FrameLayers, Renderer};
use crate::slice_cache::SliceCache;
use crate::view::{Invalidation, ResetFlags, SliceStep, ViewState, parse_alpha};
use crate::volume::{Datatype, Orientation, VolumeBuffer, VolumeHeader, VolumeKind, write_slice};

/// Segmentation preview and the slice it was inferred for.
struct SlicePreview {
    orientation: Orientation,
    slice: usize,
    image: RgbaImage,
}

pub struct CanvasPairController {
    view: ViewState,
    volume: Arc<VolumeBuffer>,
    labels: VolumeBuffer,
    table: ColorTable,
    initial_table: ColorTable,
    cache: SliceCache,
    canvases: CanvasPair,
    renderer: Renderer,
    /// Live segmentation preview shown in place of the mask layer
    preview: Option<SlicePreview>,
}

impl CanvasPairController {
    /// Build the pair for an intensity volume and an optional label volume.
    ///
    /// Without a label volume an all-zero one is created with the same
    /// geometry.
    pub fn new(
        volume: VolumeBuffer,
        labels: Option<VolumeBuffer>,
        config: &ViewerConfig,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Result<Self> {
        if volume.kind() != VolumeKind::Intensity {
            return Err(ViewerError::ReadOnlyVolume);
        }
        let labels = match labels {
            Some(labels) => {
                if labels.dims() != volume.dims() {
                    let expected = volume.header().voxel_count();
                    return Err(ViewerError::shape_mismatch(expected, labels.header().voxel_count()));
                }
                labels
            }
            None => VolumeBuffer::zeroed_labels(label_header(volume.header())),
        };

        let table = config.color_table()?;
        let view = ViewState::new(
            volume.header(),
            f64::from(canvas_width),
            f64::from(canvas_height),
            table.labels(),
        )
        .with_zoom_limits(config.zoom_limits())
        .with_default_alpha(config.preferences.default_alpha)
        .with_smoothing(config.smoothing());

        log::info!(
            "🖼️ Canvas pair {}x{} for volume {:?} ({} orientation)",
            canvas_width,
            canvas_height,
            volume.dims(),
            view.orientation().name()
        );

        let mut renderer = Renderer::new();
        renderer.request_draw();

        Ok(Self {
            view,
            volume: Arc::new(volume),
            labels,
            initial_table: table.clone(),
            table,
            cache: SliceCache::new(),
            canvases: CanvasPair::new(canvas_width, canvas_height),
            renderer,
            preview: None,
        })
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn labels(&self) -> &VolumeBuffer {
        &self.labels
    }

    pub fn color_table(&self) -> &ColorTable {
        &self.table
    }

    pub fn cache(&self) -> &SliceCache {
        &self.cache
    }

    pub fn canvases(&self) -> &CanvasPair {
        &self.canvases
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The preview, if its slice is the one shown.
    pub fn preview(&self) -> Option<&RgbaImage> {
        visible(&self.preview, &self.view)
    }

    fn apply(&mut self, invalidation: Invalidation) -> Invalidation {
        if !invalidation.is_none() {
            self.cache.apply(invalidation);
            self.renderer.request_draw();
        }
        invalidation
    }

    // ------------------------------------------------------------------------
    // View operations
    // ------------------------------------------------------------------------

    pub fn reset_view(&mut self) -> Invalidation {
        let inv = self.view.reset_view();
        self.apply(inv)
    }

    pub fn pan(&mut self, dx: f64, dy: f64) -> Invalidation {
        let inv = self.view.pan(dx, dy);
        self.apply(inv)
    }

    pub fn scale(&mut self, pivot_x: f64, pivot_y: f64, direction: f64) -> Invalidation {
        let inv = self.view.scale(pivot_x, pivot_y, direction);
        self.apply(inv)
    }

    pub fn change_slice(&mut self, step: SliceStep) -> Invalidation {
        let inv = self.view.change_slice(step);
        self.apply(inv)
    }

    pub fn set_orientation(&mut self, orientation: Orientation) -> Invalidation {
        let inv = self.view.set_orientation(orientation);
        self.apply(inv)
    }

    pub fn cycle_orientation(&mut self) -> Invalidation {
        let inv = self.view.cycle_orientation();
        self.apply(inv)
    }

    pub fn set_window(&mut self, min: f64, max: f64) -> Invalidation {
        let inv = self.view.set_window(min, max);
        self.apply(inv)
    }

    pub fn set_window_width_level(&mut self, width: f64, level: f64) -> Invalidation {
        let inv = self.view.set_window_width_level(width, level);
        self.apply(inv)
    }

    /// Set the mask alpha from user input such as `"128"` or `"50%"`.
    pub fn set_alpha(&mut self, input: &str) -> Result<Invalidation> {
        let alpha = parse_alpha(input)?;
        let inv = self.view.set_alpha(alpha);
        Ok(self.apply(inv))
    }

    pub fn set_label_visible(&mut self, label: u32, visible: bool) -> Invalidation {
        let inv = self.view.set_label_visible(label, visible);
        self.apply(inv)
    }

    pub fn toggle_smoothing(&mut self, image: bool, mask: bool) -> Invalidation {
        let inv = self.view.toggle_smoothing(image, mask);
        self.apply(inv)
    }

    /// Replace the label colors.
    pub fn set_color_table(&mut self, table: ColorTable) -> Invalidation {
        if table == self.table {
            return Invalidation::NONE;
        }
        self.table = table;
        self.apply(Invalidation {
            mask: true,
            ..Invalidation::REDRAW
        })
    }

    pub fn reset(&mut self, flags: ResetFlags) -> Invalidation {
        let mut inv = self.view.reset(flags);
        if flags.color_map && self.table != self.initial_table {
            self.table = self.initial_table.clone();
            inv = inv.merge(Invalidation {
                mask: true,
                ..Invalidation::REDRAW
            });
        }
        self.apply(inv)
    }

    /// Resize both canvases and refit the slice.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> Invalidation {
        self.canvases.resize(width, height);
        let inv = self.view.resize_canvas(f64::from(width), f64::from(height));
        self.apply(inv.merge(Invalidation::REDRAW))
    }

    // ------------------------------------------------------------------------
    // Segmentation output
    // ------------------------------------------------------------------------

    /// Show a live preview over the mask layer of `slice`.
    ///
    /// The preview is only drawn while that slice is shown.
    pub fn show_preview(&mut self, orientation: Orientation, slice: usize, image: RgbaImage) {
        self.preview = Some(SlicePreview {
            orientation,
            slice,
            image,
        });
        self.renderer.request_draw();
    }

    pub fn clear_preview(&mut self) {
        if self.preview.take().is_some() {
            self.renderer.request_draw();
        }
    }

    /// Overwrite one label slice with a finalized mask.
    ///
    /// The last commit to a slice wins. The volume is left unchanged when
    /// `values` does not match the slice size.
    pub fn commit_labels(&mut self, orientation: Orientation, slice: usize, values: &[u8]) -> Result<()> {
        let labels: Vec<u32> = values.iter().map(|&v| u32::from(v)).collect();
        write_slice(&mut self.labels, orientation, slice, &labels)?;

        if orientation == self.view.orientation() {
            self.cache.invalidate_mask_slice(slice);
        } else {
            self.cache.apply(Invalidation {
                mask: true,
                ..Invalidation::NONE
            });
        }
        self.preview = None;
        self.renderer.request_draw();
        log::info!(
            "Committed {} labelled voxels to {} slice {}",
            values.iter().filter(|&&v| v != 0).count(),
            orientation.name(),
            slice
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Redraw both canvases if a draw was requested since the last frame.
    pub fn on_animation_frame(&mut self) -> Result<bool> {
        if !self.renderer.begin_frame() {
            return Ok(false);
        }

        let image = self.cache.image.get_or_render(&self.volume, &self.view)?;
        let mask = self.cache.mask.get_or_render(&self.labels, &self.view, &self.table)?;
        self.renderer.draw(
            &mut self.canvases,
            &self.view,
            FrameLayers {
                image,
                mask,
                preview: visible(&self.preview, &self.view),
            },
        );
        Ok(true)
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod prerender_support {
    use super::*;
    use crate::prerender::{PrerenderJob, PrerenderSource, PrerenderWorker};
    use crate::slice_cache::LayerTag;

    impl CanvasPairController {
        /// Queue background rasterization of every slice not yet cached.
        pub fn start_prerender(&self, worker: &mut PrerenderWorker) {
            let depth = self.view.depth();
            let window = self.view.window();
            let alpha = self.view.mask_display().alpha;
            let generation = self.cache.generation();

            worker.submit(PrerenderJob {
                source: PrerenderSource::Image {
                    volume: Arc::clone(&self.volume),
                    window,
                },
                orientation: self.view.orientation(),
                generation,
                skip: (0..depth)
                    .filter(|&s| self.cache.image.is_fresh(s, window))
                    .collect(),
            });
            worker.submit(PrerenderJob {
                source: PrerenderSource::Mask {
                    labels: Arc::new(self.labels.clone()),
                    table: self.table.clone(),
                    display: self.view.mask_display().clone(),
                },
                orientation: self.view.orientation(),
                generation,
                skip: (0..depth)
                    .filter(|&s| self.cache.mask.is_fresh(s, alpha))
                    .collect(),
            });
        }

        /// Move finished background slices into the cache. Returns how many
        /// were accepted.
        pub fn collect_prerendered(&mut self, worker: &mut PrerenderWorker) -> usize {
            let mut accepted = 0;
            while let Some(done) = worker.take_one_result() {
                let current = done.slice == self.view.slice();
                let is_mask = matches!(done.tag, LayerTag::Mask { .. });
                if self
                    .cache
                    .insert_prerendered(done.slice, done.tag, done.generation, done.image, &self.view)
                {
                    accepted += 1;
                    if current && !is_mask {
                        self.renderer.request_draw();
                    }
                }
            }
            accepted
        }
    }
}

fn visible<'a>(preview: &'a Option<SlicePreview>, view: &ViewState) -> Option<&'a RgbaImage> {
    preview
        .as_ref()
        .filter(|p| p.orientation == view.orientation() && p.slice == view.slice())
        .map(|p| &p.image)
}

/// Label volume header matching an intensity header: u8, unscaled.
fn label_header(header: &VolumeHeader) -> VolumeHeader {
    VolumeHeader {
        datatype: Datatype::U8,
        little_endian: true,
        scl_slope: 1.0,
        scl_inter: 0.0,
        ..header.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::read_labels;

    fn volume() -> VolumeBuffer {
        let header = VolumeHeader::new([10, 10, 4], Datatype::U8).with_cal_range(0.0, 100.0);
        VolumeBuffer::new(header, VolumeKind::Intensity, vec![50; 400]).unwrap()
    }

    fn controller() -> CanvasPairController {
        CanvasPairController::new(volume(), None, &ViewerConfig::new(), 100, 100).unwrap()
    }

    #[test]
    fn test_first_frame_draws_once() {
        let mut pair = controller();
        assert!(pair.on_animation_frame().unwrap());
        assert!(!pair.on_animation_frame().unwrap());
        assert_eq!(pair.renderer().frames_drawn(), 1);
        assert_eq!(pair.canvases().image.pixels().get_pixel(50, 50).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_mutations_coalesce_into_one_frame() {
        let mut pair = controller();
        pair.on_animation_frame().unwrap();

        pair.pan(5.0, 0.0);
        pair.scale(50.0, 50.0, 1.0);
        pair.set_window(0.0, 50.0);
        assert!(pair.on_animation_frame().unwrap());
        assert_eq!(pair.renderer().frames_drawn(), 2);
        assert_eq!(pair.cache().image.render_count(), 2);
    }

    #[test]
    fn test_same_slice_schedules_nothing() {
        let mut pair = controller();
        pair.on_animation_frame().unwrap();
        let slice = pair.view().slice() as i64;

        assert!(pair.change_slice(SliceStep::Absolute(slice)).is_none());
        assert!(!pair.renderer().is_pending());
        assert!(!pair.on_animation_frame().unwrap());
        assert_eq!(pair.cache().image.render_count(), 1);
    }

    #[test]
    fn test_commit_labels_rerenders_mask_slice() {
        let mut pair = controller();
        pair.on_animation_frame().unwrap();
        let slice = pair.view().slice();
        let orientation = pair.view().orientation();

        let mut values = vec![0u8; 100];
        values[0] = 1;
        pair.commit_labels(orientation, slice, &values).unwrap();
        assert_eq!(read_labels(pair.labels(), orientation, slice).unwrap()[0], 1);

        assert!(pair.on_animation_frame().unwrap());
        assert_eq!(pair.cache().mask.render_count(), 2);
        assert_eq!(pair.canvases().mask.pixels().get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_commit_labels_wrong_size_leaves_volume() {
        let mut pair = controller();
        let orientation = pair.view().orientation();
        let result = pair.commit_labels(orientation, 0, &[1u8; 10]);
        assert!(matches!(result, Err(ViewerError::ShapeMismatch { .. })));
        assert!(pair.labels().as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_preview_replaces_mask_layer() {
        let mut pair = controller();
        pair.on_animation_frame().unwrap();
        let (orientation, slice) = (pair.view().orientation(), pair.view().slice());
        let green = RgbaImage::from_pixel(10, 10, image::Rgba([0, 255, 0, 128]));
        pair.show_preview(orientation, slice, green);
        pair.on_animation_frame().unwrap();
        assert_eq!(pair.canvases().mask.pixels().get_pixel(50, 50).0, [0, 255, 0, 128]);

        pair.clear_preview();
        pair.on_animation_frame().unwrap();
        assert_eq!(pair.canvases().mask.pixels().get_pixel(50, 50).0[3], 0);
    }

    #[test]
    fn test_preview_hidden_on_other_slices() {
        let mut pair = controller();
        let (orientation, slice) = (pair.view().orientation(), pair.view().slice());
        let green = RgbaImage::from_pixel(10, 10, image::Rgba([0, 255, 0, 128]));
        pair.show_preview(orientation, slice, green);

        pair.change_slice(SliceStep::Delta(1));
        assert!(pair.preview().is_none());
        pair.on_animation_frame().unwrap();
        assert_eq!(pair.canvases().mask.pixels().get_pixel(50, 50).0[3], 0);

        pair.change_slice(SliceStep::Delta(-1));
        pair.on_animation_frame().unwrap();
        assert_eq!(pair.canvases().mask.pixels().get_pixel(50, 50).0, [0, 255, 0, 128]);

        pair.cycle_orientation();
        assert!(pair.preview().is_none());
    }

    #[test]
    fn test_last_commit_to_a_slice_wins() {
        let mut pair = controller();
        let (orientation, slice) = (pair.view().orientation(), pair.view().slice());

        let mut first = vec![0u8; 100];
        first[0] = 1;
        first[1] = 1;
        let mut second = vec![0u8; 100];
        second[1] = 2;
        second[2] = 2;
        pair.commit_labels(orientation, slice, &first).unwrap();
        pair.commit_labels(orientation, slice, &second).unwrap();

        let written = read_labels(pair.labels(), orientation, slice).unwrap();
        assert_eq!(&written[..4], &[0, 2, 2, 0]);
        assert_eq!(written.iter().filter(|&&v| v != 0).count(), 2);
        pair.on_animation_frame().unwrap();
        assert_eq!(pair.canvases().mask.pixels().get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_alpha_input() {
        let mut pair = controller();
        assert!(pair.set_alpha("50%").unwrap().mask);
        assert_eq!(pair.view().mask_display().alpha, 128);
        assert!(pair.set_alpha("abc").is_err());
    }

    #[test]
    fn test_color_map_reset() {
        let mut pair = controller();
        let mut map = std::collections::BTreeMap::new();
        map.insert("1".to_string(), "#00FF00".to_string());
        pair.set_color_table(ColorTable::from_hex_map(&map).unwrap());
        assert_eq!(pair.color_table().len(), 1);

        let flags = ResetFlags {
            color_map: true,
            ..ResetFlags::default()
        };
        assert!(pair.reset(flags).mask);
        assert_eq!(pair.color_table().len(), 6);
    }

    #[test]
    fn test_label_volume_must_match() {
        let header = VolumeHeader::new([5, 5, 4], Datatype::U8);
        let labels = VolumeBuffer::zeroed_labels(header);
        let result = CanvasPairController::new(volume(), Some(labels), &ViewerConfig::new(), 10, 10);
        assert!(matches!(result, Err(ViewerError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_prerender_fills_cache() {
        use crate::prerender::PrerenderWorker;

        let mut pair = controller();
        let mut worker = PrerenderWorker::spawn().unwrap();
        pair.start_prerender(&mut worker);

        let mut accepted = 0;
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while accepted < 8 && std::time::Instant::now() < deadline {
            accepted += pair.collect_prerendered(&mut worker);
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(accepted, 8);

        pair.on_animation_frame().unwrap();
        assert_eq!(pair.cache().image.render_count(), 0);
    }
}
