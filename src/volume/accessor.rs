//! Sequential per-slice voxel access for any orientation.
//!
//! The same cursor serves all three orientations: only the assignment of
//! storage axes to the column, row and slice roles differs. Storage is
//! x-fastest, so the flat offset of logical coordinate `c` is
//! `c[0] + c[1] * dims[0] + c[2] * dims[0] * dims[1]`.

use crate::error::{Result, ViewerError};
use crate::volume::{AxisMapping, Orientation, VolumeBuffer, VolumeKind};

/// Finite row-major iterator over one slice.
///
/// Yields exactly `fast_dim * slow_dim` values, fast axis innermost,
/// starting at the top-left voxel. Intensity volumes are scaled by
/// slope/intercept; label volumes are yielded raw.
pub struct SliceCursor<'a> {
    volume: &'a VolumeBuffer,
    /// Byte step per column and per row
    col_step: usize,
    row_step: usize,
    /// Byte offset of the slice origin
    base: usize,
    fast_dim: usize,
    slow_dim: usize,
    row: usize,
    col: usize,
    slope: f64,
    intercept: f64,
}

impl<'a> SliceCursor<'a> {
    fn new(volume: &'a VolumeBuffer, mapping: AxisMapping, slice: usize) -> Self {
        let dims = volume.dims();
        let bpv = volume.bytes_per_voxel();
        let strides = [bpv, bpv * dims[0], bpv * dims[0] * dims[1]];
        let (slope, intercept) = match volume.kind() {
            VolumeKind::Intensity => volume.header().scale(),
            VolumeKind::Label => (1.0, 0.0),
        };

        Self {
            volume,
            col_step: strides[mapping.fast],
            row_step: strides[mapping.slow],
            base: slice * strides[mapping.slice],
            fast_dim: mapping.fast_dim(dims),
            slow_dim: mapping.slow_dim(dims),
            row: 0,
            col: 0,
            slope,
            intercept,
        }
    }

    /// Slice width in voxels.
    pub fn width(&self) -> usize {
        self.fast_dim
    }

    /// Slice height in voxels.
    pub fn height(&self) -> usize {
        self.slow_dim
    }

    fn remaining(&self) -> usize {
        if self.fast_dim == 0 || self.row >= self.slow_dim {
            0
        } else {
            (self.slow_dim - self.row) * self.fast_dim - self.col
        }
    }
}

impl Iterator for SliceCursor<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.remaining() == 0 {
            return None;
        }

        let offset = self.base + self.row * self.row_step + self.col * self.col_step;
        let value = self.volume.sample(offset) * self.slope + self.intercept;

        self.col += 1;
        if self.col == self.fast_dim {
            self.col = 0;
            self.row += 1;
        }
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for SliceCursor<'_> {}

/// `(width, height, depth)` of slices in `orientation`.
pub fn slice_shape(volume: &VolumeBuffer, orientation: Orientation) -> (usize, usize, usize) {
    let mapping = AxisMapping::resolve(orientation, &volume.header().axis_code);
    let dims = volume.dims();
    (
        mapping.fast_dim(dims),
        mapping.slow_dim(dims),
        mapping.depth(dims),
    )
}

fn checked_mapping(
    volume: &VolumeBuffer,
    orientation: Orientation,
    slice: usize,
) -> Result<AxisMapping> {
    let mapping = AxisMapping::resolve(orientation, &volume.header().axis_code);
    let depth = mapping.depth(volume.dims());
    if slice >= depth {
        return Err(ViewerError::SliceOutOfRange { slice, depth });
    }
    Ok(mapping)
}

/// Lazily read one slice in row-major order.
pub fn read_slice(
    volume: &VolumeBuffer,
    orientation: Orientation,
    slice: usize,
) -> Result<SliceCursor<'_>> {
    let mapping = checked_mapping(volume, orientation, slice)?;
    Ok(SliceCursor::new(volume, mapping, slice))
}

/// Read one slice of a label volume as integer labels.
pub fn read_labels(volume: &VolumeBuffer, orientation: Orientation, slice: usize) -> Result<Vec<u32>> {
    Ok(read_slice(volume, orientation, slice)?
        .map(|v| v as u32)
        .collect())
}

/// Overwrite one slice of a label volume.
///
/// `values` must hold exactly `width * height` labels in row-major order;
/// otherwise nothing is written.
pub fn write_slice(
    volume: &mut VolumeBuffer,
    orientation: Orientation,
    slice: usize,
    values: &[u32],
) -> Result<()> {
    if volume.kind() != VolumeKind::Label {
        return Err(ViewerError::ReadOnlyVolume);
    }
    let mapping = checked_mapping(volume, orientation, slice)?;

    let dims = *volume.dims();
    let fast_dim = mapping.fast_dim(&dims);
    let slow_dim = mapping.slow_dim(&dims);
    if values.len() != fast_dim * slow_dim {
        return Err(ViewerError::shape_mismatch(fast_dim * slow_dim, values.len()));
    }

    let bpv = volume.bytes_per_voxel();
    let strides = [bpv, bpv * dims[0], bpv * dims[0] * dims[1]];
    let base = slice * strides[mapping.slice];

    for (row, row_values) in values.chunks_exact(fast_dim).enumerate() {
        let row_base = base + row * strides[mapping.slow];
        for (col, &label) in row_values.iter().enumerate() {
            volume.store_label(row_base + col * strides[mapping.fast], label);
        }
    }

    log::debug!(
        "Wrote {} labels to {} slice {}",
        values.len(),
        orientation.name(),
        slice
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{AxisCode, Datatype, VolumeHeader};

    /// Label volume whose voxel at (x, y, z) holds x + 10*y + 100*z.
    fn coded_labels(dims: [usize; 3], code: &str) -> VolumeBuffer {
        let header = VolumeHeader::new(dims, Datatype::U16).with_axis_code(AxisCode::parse(code).unwrap());
        let mut data = Vec::with_capacity(header.byte_len());
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    data.extend_from_slice(&((x + 10 * y + 100 * z) as u16).to_le_bytes());
                }
            }
        }
        VolumeBuffer::new(header, VolumeKind::Label, data).unwrap()
    }

    #[test]
    fn test_axial_slice_row_major() {
        let header = VolumeHeader::new([10, 10, 4], Datatype::U8);
        let data: Vec<u8> = (0..400).map(|i| (i % 256) as u8).collect();
        let volume = VolumeBuffer::new(header, VolumeKind::Intensity, data).unwrap();

        let values: Vec<f64> = read_slice(&volume, Orientation::Axial, 2).unwrap().collect();
        assert_eq!(values.len(), 100);
        // First value is voxel (0, 0, 2), flat index 200
        assert_eq!(values[0], 200.0);
        assert_eq!(values[1], 201.0);
        assert_eq!(values[10], 210.0);
    }

    #[test]
    fn test_sagittal_and_coronal_addressing() {
        let volume = coded_labels([3, 4, 5], "LPI");

        // Sagittal: fast = y, slow = z, slice = x
        let (w, h, d) = slice_shape(&volume, Orientation::Sagittal);
        assert_eq!((w, h, d), (4, 5, 3));
        let sag = read_labels(&volume, Orientation::Sagittal, 2).unwrap();
        assert_eq!(sag[0], 2);
        assert_eq!(sag[1], 12);
        assert_eq!(sag[4], 102);

        // Coronal: fast = x, slow = z, slice = y
        let cor = read_labels(&volume, Orientation::Coronal, 3).unwrap();
        assert_eq!(cor.len(), 15);
        assert_eq!(cor[0], 30);
        assert_eq!(cor[1], 31);
        assert_eq!(cor[3], 130);
    }

    #[test]
    fn test_cursor_exact_size() {
        let volume = coded_labels([3, 4, 5], "PIL");
        let cursor = read_slice(&volume, Orientation::Axial, 0).unwrap();
        let expected = cursor.width() * cursor.height();
        assert_eq!(cursor.len(), expected);
        assert_eq!(cursor.count(), expected);
    }

    #[test]
    fn test_read_write_round_trip_all_orientations() {
        for code in ["LPI", "PIL", "LIP"] {
            let mut volume = coded_labels([3, 4, 5], code);
            let original = volume.as_bytes().to_vec();
            for orientation in Orientation::all() {
                let (_, _, depth) = slice_shape(&volume, *orientation);
                for slice in 0..depth {
                    let values = read_labels(&volume, *orientation, slice).unwrap();
                    write_slice(&mut volume, *orientation, slice, &values).unwrap();
                    assert_eq!(volume.as_bytes(), original.as_slice());
                }
            }
        }
    }

    #[test]
    fn test_write_only_touches_target_slice() {
        let mut volume = coded_labels([3, 4, 5], "LPI");
        write_slice(&mut volume, Orientation::Sagittal, 1, &[7; 20]).unwrap();

        assert!(read_labels(&volume, Orientation::Sagittal, 1).unwrap().iter().all(|&v| v == 7));
        assert_eq!(read_labels(&volume, Orientation::Sagittal, 0).unwrap()[0], 0);
        assert_eq!(read_labels(&volume, Orientation::Sagittal, 2).unwrap()[0], 2);
    }

    #[test]
    fn test_write_shape_mismatch_leaves_volume_unchanged() {
        let mut volume = coded_labels([3, 4, 5], "LPI");
        let original = volume.as_bytes().to_vec();
        let err = write_slice(&mut volume, Orientation::Axial, 0, &[1; 11]).unwrap_err();
        assert!(matches!(err, ViewerError::ShapeMismatch { expected: 12, actual: 11 }));
        assert_eq!(volume.as_bytes(), original.as_slice());
    }

    #[test]
    fn test_intensity_volume_is_read_only() {
        let header = VolumeHeader::new([2, 2, 1], Datatype::U8);
        let mut volume = VolumeBuffer::new(header, VolumeKind::Intensity, vec![0; 4]).unwrap();
        assert!(matches!(
            write_slice(&mut volume, Orientation::Axial, 0, &[1; 4]),
            Err(ViewerError::ReadOnlyVolume)
        ));
    }

    #[test]
    fn test_intensity_scaling_applied() {
        let header = VolumeHeader::new([2, 1, 1], Datatype::I16).with_scaling(2.0, -1024.0);
        let data = [10i16, 20].iter().flat_map(|v| v.to_le_bytes()).collect();
        let volume = VolumeBuffer::new(header, VolumeKind::Intensity, data).unwrap();
        let values: Vec<f64> = read_slice(&volume, Orientation::Axial, 0).unwrap().collect();
        assert_eq!(values, vec![-1004.0, -984.0]);
    }

    #[test]
    fn test_slice_out_of_range() {
        let volume = coded_labels([3, 4, 5], "LPI");
        assert!(matches!(
            read_slice(&volume, Orientation::Axial, 5),
            Err(ViewerError::SliceOutOfRange { slice: 5, depth: 5 })
        ));
    }
}
