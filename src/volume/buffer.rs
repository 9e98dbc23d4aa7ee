//! Raw voxel storage.

use crate::error::{Result, ViewerError};
use crate::volume::{Datatype, VolumeHeader};

/// Whether a volume holds display intensities or integer labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeKind {
    /// Read-only intensities, scaled by slope/intercept on read
    Intensity,
    /// Read-write integer labels, read and written raw
    Label,
}

/// Raw voxel bytes plus the header describing them.
///
/// Each buffer is owned by exactly one volume; background work receives a
/// clone or an immutable snapshot, never a shared mutable reference.
#[derive(Debug, Clone)]
pub struct VolumeBuffer {
    header: VolumeHeader,
    kind: VolumeKind,
    data: Vec<u8>,
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

macro_rules! decode {
    ($t:ty, $n:literal, $bytes:expr, $le:expr) => {{
        let raw = fixed::<$n>($bytes);
        if $le {
            <$t>::from_le_bytes(raw)
        } else {
            <$t>::from_be_bytes(raw)
        }
    }};
}

macro_rules! encode {
    ($value:expr, $le:expr) => {{
        let v = $value;
        if $le { v.to_le_bytes() } else { v.to_be_bytes() }
    }};
}

impl VolumeBuffer {
    /// Wrap decoded voxel bytes. The length must match the header.
    pub fn new(header: VolumeHeader, kind: VolumeKind, data: Vec<u8>) -> Result<Self> {
        let expected = header.byte_len();
        if data.len() != expected {
            return Err(ViewerError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { header, kind, data })
    }

    /// Create an all-zero label volume matching `header`.
    pub fn zeroed_labels(header: VolumeHeader) -> Self {
        let data = vec![0u8; header.byte_len()];
        Self {
            header,
            kind: VolumeKind::Label,
            data,
        }
    }

    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    pub fn kind(&self) -> VolumeKind {
        self.kind
    }

    pub fn dims(&self) -> &[usize; 3] {
        &self.header.dims
    }

    pub fn bytes_per_voxel(&self) -> usize {
        self.header.datatype.bytes_per_voxel()
    }

    /// Raw voxel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode the unscaled sample starting at `byte_offset`.
    pub fn sample(&self, byte_offset: usize) -> f64 {
        let le = self.header.little_endian;
        let bytes = &self.data[byte_offset..byte_offset + self.bytes_per_voxel()];
        match self.header.datatype {
            Datatype::U8 => f64::from(bytes[0]),
            Datatype::I8 => f64::from(bytes[0] as i8),
            Datatype::I16 => f64::from(decode!(i16, 2, bytes, le)),
            Datatype::U16 => f64::from(decode!(u16, 2, bytes, le)),
            Datatype::I32 => f64::from(decode!(i32, 4, bytes, le)),
            Datatype::U32 => f64::from(decode!(u32, 4, bytes, le)),
            Datatype::F32 => f64::from(decode!(f32, 4, bytes, le)),
            Datatype::F64 => decode!(f64, 8, bytes, le),
        }
    }

    /// Encode a label at `byte_offset`, saturating to the storage type.
    pub(crate) fn store_label(&mut self, byte_offset: usize, label: u32) {
        let le = self.header.little_endian;
        let n = self.bytes_per_voxel();
        let target = &mut self.data[byte_offset..byte_offset + n];
        match self.header.datatype {
            Datatype::U8 => target[0] = label.min(u32::from(u8::MAX)) as u8,
            Datatype::I8 => target[0] = label.min(i8::MAX as u32) as u8,
            Datatype::I16 => target.copy_from_slice(&encode!(label.min(i16::MAX as u32) as i16, le)),
            Datatype::U16 => {
                target.copy_from_slice(&encode!(label.min(u32::from(u16::MAX)) as u16, le))
            }
            Datatype::I32 => target.copy_from_slice(&encode!(label.min(i32::MAX as u32) as i32, le)),
            Datatype::U32 => target.copy_from_slice(&encode!(label, le)),
            Datatype::F32 => target.copy_from_slice(&encode!(label as f32, le)),
            Datatype::F64 => target.copy_from_slice(&encode!(f64::from(label), le)),
        }
    }
}
