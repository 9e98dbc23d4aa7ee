//! Error types for viewer, annotation and segmentation operations.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ViewerError>;

/// Errors that can occur while reading volumes, annotating or segmenting.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// Slice write buffer does not match the slice size. The volume is left unchanged.
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Number of voxels in the target slice
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// Canvas coordinate resolved outside the image
    #[error("Coordinate ({x}, {y}) is outside the image")]
    OutOfBounds {
        /// Canvas X offset
        x: f64,
        /// Canvas Y offset
        y: f64,
    },

    /// An annotation with the same kind and coordinates is already committed
    #[error("Duplicate annotation rejected: [{key}]")]
    DuplicateAnnotation {
        /// Dedup key of the rejected annotation
        key: String,
    },

    /// A rectangle is being drawn and must be finished first
    #[error("Finish the ongoing annotation before starting another")]
    AnnotationInProgress,

    /// Prompt placed while a slice other than the segmented one is shown
    #[error("Prompts belong to slice {run}, but slice {shown} is shown")]
    SliceMismatch {
        /// Slice the segmentation run was started on
        run: usize,
        /// Slice currently shown
        shown: usize,
    },

    /// A rectangle commit arrived with no anchored rectangle
    #[error("No rectangle is being drawn")]
    NoPendingRectangle,

    /// Annotation or inference requested outside an active segmentation
    #[error("No segmentation session is active")]
    NoActiveSession,

    /// Embedding fetch or inference transport failed
    #[error("Upstream service failure: {0}")]
    UpstreamService(String),

    /// Model index not present in the model registry
    #[error("Invalid model selection: {0}")]
    InvalidModelSelection(usize),

    /// No inference worker is running
    #[error("Inference worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// Operation was cancelled before it produced a result
    #[error("Operation cancelled")]
    Cancelled,

    /// Native axis order string is not a valid three-letter code
    #[error("Invalid axis code '{0}'")]
    InvalidAxisCode(String),

    /// NIfTI datatype code not supported by the voxel reader
    #[error("Unsupported voxel datatype code {0}")]
    UnsupportedDatatype(i16),

    /// Raw buffer length does not match the header
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize {
        /// Byte length implied by dims and datatype
        expected: usize,
        /// Byte length supplied
        actual: usize,
    },

    /// Slice index beyond the depth of the current orientation
    #[error("Slice {slice} out of range (depth {depth})")]
    SliceOutOfRange {
        /// Requested slice
        slice: usize,
        /// Number of slices along the slice axis
        depth: usize,
    },

    /// Write attempted on an intensity volume
    #[error("Volume is read-only")]
    ReadOnlyVolume,

    /// Hex color string could not be parsed
    #[error("Invalid color '{0}'")]
    InvalidColor(String),

    /// Label is zero or missing from the color map
    #[error("Invalid label {0}")]
    InvalidLabel(u32),

    /// Alpha value could not be parsed
    #[error("Invalid alpha value '{0}'")]
    InvalidAlpha(String),

    /// Embedding blob has the wrong size or encoding
    #[error("Invalid embedding: {0}")]
    Embedding(String),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// SVG overlay serialization error
    #[error("XML error: {0}")]
    Xml(String),
}

impl ViewerError {
    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { expected, actual }
    }

    /// Create an out-of-bounds error for a canvas offset.
    pub fn out_of_bounds(x: f64, y: f64) -> Self {
        Self::OutOfBounds { x, y }
    }

    /// Create a duplicate annotation error.
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::DuplicateAnnotation { key: key.into() }
    }

    /// Create an upstream failure error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamService(message.into())
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Whether the error is recovered locally and only surfaced as a toast.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OutOfBounds { .. }
                | Self::DuplicateAnnotation { .. }
                | Self::AnnotationInProgress
                | Self::SliceMismatch { .. }
        )
    }
}
