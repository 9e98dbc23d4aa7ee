//! Volume metadata supplied by the NIfTI decoder.

use crate::error::{Result, ViewerError};
use crate::volume::AxisCode;

/// Voxel storage type, identified by its NIfTI datatype code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    U8,
    I16,
    I32,
    F32,
    F64,
    I8,
    U16,
    U32,
}

impl Datatype {
    /// Map a NIfTI datatype code to a storage type.
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            2 => Ok(Datatype::U8),
            4 => Ok(Datatype::I16),
            8 => Ok(Datatype::I32),
            16 => Ok(Datatype::F32),
            64 => Ok(Datatype::F64),
            256 => Ok(Datatype::I8),
            512 => Ok(Datatype::U16),
            768 => Ok(Datatype::U32),
            other => Err(ViewerError::UnsupportedDatatype(other)),
        }
    }

    /// NIfTI datatype code.
    pub fn code(&self) -> i16 {
        match self {
            Datatype::U8 => 2,
            Datatype::I16 => 4,
            Datatype::I32 => 8,
            Datatype::F32 => 16,
            Datatype::F64 => 64,
            Datatype::I8 => 256,
            Datatype::U16 => 512,
            Datatype::U32 => 768,
        }
    }

    pub fn bytes_per_voxel(&self) -> usize {
        match self {
            Datatype::U8 | Datatype::I8 => 1,
            Datatype::I16 | Datatype::U16 => 2,
            Datatype::I32 | Datatype::U32 | Datatype::F32 => 4,
            Datatype::F64 => 8,
        }
    }
}

/// Header fields the viewer consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeHeader {
    /// Voxel counts along the three storage axes
    pub dims: [usize; 3],
    /// Physical voxel spacing along the three storage axes
    pub spacing: [f64; 3],
    pub datatype: Datatype,
    pub little_endian: bool,
    /// Intensity scale; a slope of 0 means unscaled
    pub scl_slope: f64,
    pub scl_inter: f64,
    /// Display range suggested by the file
    pub cal_min: f64,
    pub cal_max: f64,
    /// Native axis order
    pub axis_code: AxisCode,
}

impl VolumeHeader {
    /// Create a header with unit spacing, no scaling and LPI order.
    pub fn new(dims: [usize; 3], datatype: Datatype) -> Self {
        Self {
            dims,
            spacing: [1.0; 3],
            datatype,
            little_endian: true,
            scl_slope: 1.0,
            scl_inter: 0.0,
            cal_min: 0.0,
            cal_max: 0.0,
            axis_code: AxisCode::default(),
        }
    }

    pub fn with_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_scaling(mut self, slope: f64, intercept: f64) -> Self {
        self.scl_slope = slope;
        self.scl_inter = intercept;
        self
    }

    pub fn with_cal_range(mut self, min: f64, max: f64) -> Self {
        self.cal_min = min;
        self.cal_max = max;
        self
    }

    pub fn with_axis_code(mut self, code: AxisCode) -> Self {
        self.axis_code = code;
        self
    }

    pub fn with_big_endian(mut self) -> Self {
        self.little_endian = false;
        self
    }

    /// Effective `(slope, intercept)`; a zero slope disables scaling.
    pub fn scale(&self) -> (f64, f64) {
        if self.scl_slope == 0.0 {
            (1.0, 0.0)
        } else {
            (self.scl_slope, self.scl_inter)
        }
    }

    pub fn voxel_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Expected byte length of the voxel buffer.
    pub fn byte_len(&self) -> usize {
        self.voxel_count() * self.datatype.bytes_per_voxel()
    }
}
