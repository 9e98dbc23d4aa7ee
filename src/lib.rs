//! Aramis - volumetric slice viewer with prompted segmentation
//!
//! Renders axial, sagittal and coronal slices of a NIfTI intensity volume
//! with a label volume overlaid, and drives a mask-decoder worker from point
//! and box prompts to write new labels slice by slice.

pub mod annotation;
pub mod color;
pub mod config;
pub mod constants;
pub mod error;
pub mod render;
pub mod segmentation;
pub mod session;
pub mod slice_cache;
pub mod view;
pub mod volume;

#[cfg(not(target_arch = "wasm32"))]
pub mod prerender;

pub use config::{LogLevel, ViewerConfig, init_logging};
pub use error::{Result, ViewerError};
pub use session::{CanvasPairController, ViewerSession};
pub use volume::{Datatype, Orientation, VolumeBuffer, VolumeHeader, VolumeKind};
