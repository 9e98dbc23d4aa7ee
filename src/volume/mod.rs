//! Volumetric voxel storage and orientation-aware slice access.
//!
//! This module provides:
//! - `VolumeHeader` / `Datatype`: metadata handed over by the NIfTI decoder
//! - `VolumeBuffer`: the raw voxel bytes of an intensity or label volume
//! - `AxisCode` / `AxisMapping`: resolution of fast/slow/slice axes per orientation
//! - `read_slice` / `write_slice`: sequential slice access for any orientation

mod accessor;
mod axis;
mod buffer;
mod header;

pub use accessor::{SliceCursor, read_labels, read_slice, slice_shape, write_slice};
pub use axis::{AxisCode, AxisMapping, Orientation};
pub use buffer::{VolumeBuffer, VolumeKind};
pub use header::{Datatype, VolumeHeader};
