//! Wiring of the view, caches, renderer and segmentation into a session.
//!
//! - `CanvasPairController`: one image+mask canvas pair and everything it draws from
//! - `ViewerSession`: the pair plus the inference worker and the active segmentation run

mod controller;
mod viewer;

pub use controller::CanvasPairController;
pub use viewer::{Toast, ViewerSession};
