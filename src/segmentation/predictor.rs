//! Worker-side prompt handling around an opaque mask predictor.
//!
//! The predictor maps an embedding plus point prompts to per-pixel logits.
//! `PromptedPredictor` keeps the embedding, frame and color a worker has
//! received across messages and turns logits into preview or final payloads.

use ndarray::{Array2, Array3, Array4};
use std::sync::Arc;

use crate::color::Rgba;
use crate::constants::{LOW_RES_MASK_SIZE, MASK_THRESHOLD};
use crate::error::{Result, ViewerError};
use crate::segmentation::embedding::decode_embedding;
use crate::segmentation::protocol::{FrameGeometry, WorkerPayload, WorkerRequest, encode_prompts};

/// Model inputs for one prediction.
#[derive(Debug, Clone)]
pub struct PromptInput {
    /// `[1, 256, 64, 64]`
    pub embedding: Arc<Array4<f32>>,
    /// `[1, n, 2]`
    pub point_coords: Array3<f32>,
    /// `[1, n]`
    pub point_labels: Array2<f32>,
    /// `[h, w]` of the slice
    pub image_size: [f32; 2],
    /// `[1, 1, 256, 256]`, zeros when there is no prior prediction
    pub last_pred_mask: Array4<f32>,
    /// 1.0 when `last_pred_mask` holds a prior prediction
    pub has_last_pred: f32,
}

/// Point/box-conditioned mask model.
pub trait MaskPredictor: Send {
    /// Logits for every pixel of an `image_size` slice, row-major.
    fn predict(&mut self, input: &PromptInput) -> Result<Vec<f32>>;
}

/// Prompt state a worker keeps between messages.
pub struct PromptedPredictor<P> {
    predictor: P,
    embedding: Option<Arc<Array4<f32>>>,
    frame: Option<FrameGeometry>,
    color: Option<Rgba>,
}

impl<P: MaskPredictor> PromptedPredictor<P> {
    pub fn new(predictor: P) -> Self {
        Self {
            predictor,
            embedding: None,
            frame: None,
            color: None,
        }
    }

    /// Store the embedding, frame and color a request carries.
    pub fn absorb(&mut self, request: &WorkerRequest) -> Result<()> {
        if let Some(color) = request.color {
            self.color = Some(color);
        }
        if let Some(encoded) = &request.embedding {
            self.embedding = Some(Arc::new(decode_embedding(encoded)?));
            self.frame = request.frame;
        }
        Ok(())
    }

    /// Handle one request.
    ///
    /// Yields nothing for an empty prompt list or before a color is known.
    /// A final mask clears the stored state.
    pub fn handle(&mut self, request: &WorkerRequest) -> Result<Option<WorkerPayload>> {
        self.absorb(request)?;
        if request.coords.is_empty() || self.color.is_none() {
            return Ok(None);
        }

        let (Some(embedding), Some(frame)) = (self.embedding.clone(), self.frame) else {
            return Err(ViewerError::embedding("no embedding received yet"));
        };
        let input = build_input(embedding, frame, request)?;
        let logits = self.predictor.predict(&input)?;
        if logits.len() != frame.w * frame.h {
            return Err(ViewerError::shape_mismatch(frame.w * frame.h, logits.len()));
        }

        if let Some(label) = request.final_label {
            let mask = logits
                .iter()
                .map(|&v| if v > MASK_THRESHOLD { label } else { 0 })
                .collect();
            self.reset();
            return Ok(Some(WorkerPayload::Final(mask)));
        }

        let color = self.color.unwrap_or(Rgba::TRANSPARENT);
        let mut data = Vec::with_capacity(logits.len() * 4);
        for &v in &logits {
            let px = if v > MASK_THRESHOLD { color } else { Rgba::TRANSPARENT };
            data.extend_from_slice(&[px.r, px.g, px.b, px.a]);
        }
        Ok(Some(WorkerPayload::Preview {
            width: frame.w as u32,
            height: frame.h as u32,
            data,
        }))
    }

    /// Forget the embedding, frame and color.
    pub fn reset(&mut self) {
        self.embedding = None;
        self.frame = None;
        self.color = None;
    }
}

fn build_input(
    embedding: Arc<Array4<f32>>,
    frame: FrameGeometry,
    request: &WorkerRequest,
) -> Result<PromptInput> {
    let (coords, labels) = encode_prompts(&request.coords);
    let n = labels.len();
    if coords.len() != n * 2 {
        return Err(ViewerError::shape_mismatch(n * 2, coords.len()));
    }

    let side = LOW_RES_MASK_SIZE;
    let (last_pred_mask, has_last_pred) = match &request.prior_mask {
        Some(prior) => {
            let mask = Array4::from_shape_vec((1, 1, side, side), prior.clone())
                .map_err(|_| ViewerError::shape_mismatch(side * side, prior.len()))?;
            (mask, 1.0)
        }
        None => (Array4::zeros((1, 1, side, side)), 0.0),
    };

    Ok(PromptInput {
        embedding,
        point_coords: Array3::from_shape_vec((1, n, 2), coords)
            .map_err(|e| ViewerError::embedding(e.to_string()))?,
        point_labels: Array2::from_shape_vec((1, n), labels)
            .map_err(|e| ViewerError::embedding(e.to_string()))?,
        image_size: [frame.h as f32, frame.w as f32],
        last_pred_mask,
        has_last_pred,
    })
}
