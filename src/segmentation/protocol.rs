//! Message contract between the UI and the inference worker, and the
//! request/response shapes of the embedding service.
//!
//! Messages are plain serde types so the same structs travel through a
//! native channel or, as JSON, through a Web Worker `postMessage`.

use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationKind};
use crate::color::Rgba;
use crate::constants::{BOX_BOTTOM_RIGHT_LABEL, BOX_TOP_LEFT_LABEL, PADDING_POINT_LABEL};

// ============================================================================
// Worker request
// ============================================================================

/// One prompt as the worker sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePrompt {
    /// `"pt"` or `"rect"`
    pub ent: String,
    /// `[x, y]` or `[x1, y1, x2, y2]` in slice pixels
    pub val: Vec<f32>,
    /// 1 foreground, 0 background
    pub label: u8,
}

impl From<&Annotation> for WirePrompt {
    fn from(annotation: &Annotation) -> Self {
        Self {
            ent: annotation.kind().entity().to_string(),
            val: annotation
                .geometry
                .values()
                .into_iter()
                .map(|v| v as f32)
                .collect(),
            label: annotation.label.value(),
        }
    }
}

impl WirePrompt {
    fn is_rect(&self) -> bool {
        self.ent == AnnotationKind::Rect.entity()
    }
}

/// Where the slice is drawn on the canvas and its size in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameGeometry {
    pub dx: f64,
    pub dy: f64,
    pub d_width: f64,
    pub d_height: f64,
    /// Slice width in voxels
    pub w: usize,
    /// Slice height in voxels
    pub h: usize,
}

/// Message posted to the inference worker.
///
/// Fields left `None` tell the worker to reuse what it stored from an
/// earlier message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    /// Request id; responses echo it
    pub id: u64,
    /// Base64 float32 embedding blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<String>,
    pub coords: Vec<WirePrompt>,
    #[serde(flatten)]
    pub frame: Option<FrameGeometry>,
    /// Preview color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba>,
    /// Low-resolution logits of the previous prediction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_mask: Option<Vec<f32>>,
    /// Label to write; present only when requesting the final mask
    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_label: Option<u8>,
}

impl WorkerRequest {
    /// Prompt-only request reusing the worker's stored embedding and color.
    pub fn prompts(id: u64, coords: Vec<WirePrompt>) -> Self {
        Self {
            id,
            embedding: None,
            coords,
            frame: None,
            color: None,
            prior_mask: None,
            final_label: None,
        }
    }
}

// ============================================================================
// Worker response
// ============================================================================

/// Payload of a worker response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerPayload {
    /// Live preview: RGBA, `width * height * 4` bytes
    #[serde(rename = "imgData")]
    Preview {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    /// Final mask: `width * height` values, each 0 or the label
    #[serde(rename = "final")]
    Final(Vec<u8>),
    /// Inference failed in the worker
    #[serde(rename = "error")]
    Error(String),
}

/// Message posted back by the inference worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: u64,
    #[serde(flatten)]
    pub payload: WorkerPayload,
}

// ============================================================================
// Prompt encoding
// ============================================================================

/// Flatten prompts into model point coordinates and labels.
///
/// Points keep their own label, rectangle corners get labels 2 and 3. When
/// no rectangle is present a padding point `(0, 0)` with label -1 is
/// appended, as the model requires.
pub fn encode_prompts(prompts: &[WirePrompt]) -> (Vec<f32>, Vec<f32>) {
    let mut coords = Vec::with_capacity(prompts.len() * 4 + 2);
    let mut labels = Vec::with_capacity(prompts.len() * 2 + 1);

    for prompt in prompts {
        coords.extend_from_slice(&prompt.val);
        if prompt.is_rect() {
            labels.extend_from_slice(&[BOX_TOP_LEFT_LABEL, BOX_BOTTOM_RIGHT_LABEL]);
        } else {
            labels.push(f32::from(prompt.label));
        }
    }

    if !prompts.iter().any(WirePrompt::is_rect) {
        coords.extend_from_slice(&[0.0, 0.0]);
        labels.push(PADDING_POINT_LABEL);
    }
    (coords, labels)
}

// ============================================================================
// Embedding service
// ============================================================================

/// Body of a `POST /imgEmbeddings` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Server-side path of the volume
    pub path: String,
    pub slice: usize,
    /// One-based index of the slice axis
    pub ndim: usize,
    pub min: f64,
    pub max: f64,
    /// Model variant, e.g. `vit_h`
    #[serde(rename = "sam_type")]
    pub model_variant: String,
}

/// Body of the embedding service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Base64 float32 blob of shape `[1, 256, 64, 64]`
    #[serde(rename = "imgEmb")]
    pub img_emb: String,
}
