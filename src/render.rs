//! Compositing of cached slice images onto the canvas pair.
//!
//! Draws are coalesced: any number of `request_draw` calls before the next
//! animation frame produce a single redraw of both canvases.

use image::{Rgba, RgbaImage};

use crate::view::ViewState;

// ============================================================================
// Canvas
// ============================================================================

/// Offscreen RGBA drawing surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Resize, discarding content.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    /// Fill with transparent black.
    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    /// Draw `src` scaled into the rectangle `(x, y, width, height)`,
    /// source-over. Nearest-neighbor unless `smooth`.
    pub fn draw_image(&mut self, src: &RgbaImage, x: f64, y: f64, width: f64, height: f64, smooth: bool) {
        if src.width() == 0 || src.height() == 0 || width <= 0.0 || height <= 0.0 {
            return;
        }

        let x0 = x.max(0.0).floor() as u32;
        let y0 = y.max(0.0).floor() as u32;
        let x1 = (x + width).min(f64::from(self.width())).ceil().max(0.0) as u32;
        let y1 = (y + height).min(f64::from(self.height())).ceil().max(0.0) as u32;
        let scale_x = f64::from(src.width()) / width;
        let scale_y = f64::from(src.height()) / height;

        for cy in y0..y1 {
            let v = (f64::from(cy) + 0.5 - y) * scale_y;
            if v < 0.0 || v >= f64::from(src.height()) {
                continue;
            }
            for cx in x0..x1 {
                let u = (f64::from(cx) + 0.5 - x) * scale_x;
                if u < 0.0 || u >= f64::from(src.width()) {
                    continue;
                }
                let color = if smooth {
                    sample_bilinear(src, u, v)
                } else {
                    *src.get_pixel(u as u32, v as u32)
                };
                blend_over(self.pixels.get_pixel_mut(cx, cy), color);
            }
        }
    }
}

fn sample_bilinear(src: &RgbaImage, u: f64, v: f64) -> Rgba<u8> {
    let max_x = src.width() - 1;
    let max_y = src.height() - 1;
    let fx = (u - 0.5).max(0.0);
    let fy = (v - 0.5).max(0.0);
    let (ix, iy) = ((fx as u32).min(max_x), (fy as u32).min(max_y));
    let (tx, ty) = (fx - f64::from(ix), fy - f64::from(iy));
    let (nx, ny) = ((ix + 1).min(max_x), (iy + 1).min(max_y));

    let p00 = src.get_pixel(ix, iy).0;
    let p10 = src.get_pixel(nx, iy).0;
    let p01 = src.get_pixel(ix, ny).0;
    let p11 = src.get_pixel(nx, ny).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(p00[c]) * (1.0 - tx) + f64::from(p10[c]) * tx;
        let bottom = f64::from(p01[c]) * (1.0 - tx) + f64::from(p11[c]) * tx;
        out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = f64::from(src.0[3]) / 255.0;
    if sa >= 1.0 {
        *dst = src;
        return;
    }
    if sa <= 0.0 {
        return;
    }
    let da = f64::from(dst.0[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = f64::from(src.0[c]) * sa;
        let d = f64::from(dst.0[c]) * da * (1.0 - sa);
        dst.0[c] = ((s + d) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

/// The image canvas and the mask canvas stacked above it.
#[derive(Debug, Clone)]
pub struct CanvasPair {
    pub image: Canvas,
    pub mask: Canvas,
}

impl CanvasPair {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: Canvas::new(width, height),
            mask: Canvas::new(width, height),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.image.resize(width, height);
        self.mask.resize(width, height);
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Layers to composite in one frame.
pub struct FrameLayers<'a> {
    pub image: &'a RgbaImage,
    pub mask: &'a RgbaImage,
    /// Replaces the mask layer while a segmentation preview is live
    pub preview: Option<&'a RgbaImage>,
}

/// Coalescing frame scheduler and compositor.
#[derive(Debug, Default)]
pub struct Renderer {
    pending: bool,
    frames_drawn: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a redraw on the next animation frame.
    ///
    /// Returns false if a redraw was already pending.
    pub fn request_draw(&mut self) -> bool {
        let scheduled = !self.pending;
        self.pending = true;
        scheduled
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending flag at the start of an animation frame.
    pub fn begin_frame(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn frames_drawn(&self) -> usize {
        self.frames_drawn
    }

    /// Clear and redraw both canvases of the pair with the current transform.
    pub fn draw(&mut self, pair: &mut CanvasPair, view: &ViewState, layers: FrameLayers<'_>) {
        let t = view.transform();
        let (w, h) = (t.draw_width(), t.draw_height());
        let smoothing = view.smoothing();

        pair.image.clear();
        pair.image.draw_image(layers.image, t.pan_x, t.pan_y, w, h, smoothing.image);

        pair.mask.clear();
        let mask = layers.preview.unwrap_or(layers.mask);
        pair.mask.draw_image(mask, t.pan_x, t.pan_y, w, h, smoothing.mask);

        self.frames_drawn += 1;
    }
}
