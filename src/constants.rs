//! Global constants for the viewer and the segmentation model contract.

/// Zoom increment applied per wheel notch.
pub const ZOOM_STEP: f64 = 0.10;

/// Smallest allowed zoom factor.
pub const MIN_ZOOM: f64 = 0.05;

/// Largest allowed zoom factor.
pub const MAX_ZOOM: f64 = 10.0;

/// Decimal places kept after each zoom step.
pub const ZOOM_PRECISION: u32 = 2;

/// Default mask alpha for non-zero labels.
pub const DEFAULT_MASK_ALPHA: u8 = 0xFF;

/// Shape of the image embedding tensor produced by the feature service.
pub const EMBEDDING_SHAPE: [usize; 4] = [1, 256, 64, 64];

/// Side length of the low-resolution prior mask fed back to the model.
pub const LOW_RES_MASK_SIZE: usize = 256;

/// Logits strictly above this value are foreground.
pub const MASK_THRESHOLD: f32 = 0.0;

/// Model point label for the first corner of a box prompt.
pub const BOX_TOP_LEFT_LABEL: f32 = 2.0;

/// Model point label for the second corner of a box prompt.
pub const BOX_BOTTOM_RIGHT_LABEL: f32 = 3.0;

/// Label of the padding point appended when no box prompt is present.
pub const PADDING_POINT_LABEL: f32 = -1.0;

/// Default model variants offered by the embedding service.
pub const DEFAULT_MODEL_VARIANT: &str = "vit_h";

/// Annotation overlay styling.
pub mod overlay {
    /// Point marker radius in canvas pixels.
    pub const POINT_RADIUS: f64 = 2.0;
    /// Marker stroke width.
    pub const STROKE_WIDTH: f64 = 1.0;
    /// Rectangle fill color.
    pub const RECT_FILL: &str = "#ffffff55";
    /// Stroke color for foreground prompts.
    pub const FOREGROUND_STROKE: &str = "green";
    /// Stroke color for background prompts.
    pub const BACKGROUND_STROKE: &str = "red";
}

/// User-facing toast messages.
pub mod toast {
    pub const POINT_OFF_IMAGE: &str = "Point should be on image!";
    pub const RECT_OFF_IMAGE: &str = "Rectangle should be only on image!";
    pub const FINISH_BEFORE_SWITCH: &str = "Finish ongoing annot before switching";
    pub const RESIZE_ABORT: &str = "Refrain from resizing the window while using this mode";
    pub const SESSION_ENDED: &str = "Finished or suspended annotations";
    pub const RESTART: &str = "Removing all annotations for a restart.";
    pub const INVALID_MODEL: &str = "Invalid model";
    pub const DUPLICATE: &str = "Annotation already exists";
    pub const INFERENCE_FAILED: &str = "Segmentation failed";
    pub const WRONG_SLICE: &str = "Go back to the segmented slice to add annotations";
}
