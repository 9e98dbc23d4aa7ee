//! View transform and per-pair view state.

mod state;
mod transform;

pub use state::{
    CoordResolver, ImageWindow, Invalidation, MaskDisplay, ResetFlags, SliceStep, Smoothing,
    ViewState, parse_alpha,
};
pub use transform::{CoordMode, ViewTransform, ZoomLimits};
