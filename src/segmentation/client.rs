//! UI-side driver of one segmentation run.
//!
//! At most one request is in flight. Submitting a new request cancels the
//! previous one first, and responses whose id is not the in-flight id are
//! dropped without reaching the canvas.

use image::RgbaImage;
use web_time::Instant;

use crate::annotation::Annotation;
use crate::color::Rgba;
use crate::error::Result;
use crate::segmentation::CancellationToken;
use crate::segmentation::embedding::EmbeddingHandle;
use crate::segmentation::pool::WorkerPool;
use crate::segmentation::protocol::{FrameGeometry, WirePrompt, WorkerPayload, WorkerRequest};
use crate::segmentation::worker::InferenceWorker;

/// Outcome of a worker response accepted by the client.
#[derive(Debug)]
pub enum ClientEvent {
    /// Live preview to draw over the mask canvas
    Preview(RgbaImage),
    /// Thresholded labels for `slice`, ready to be written
    Final { slice: usize, labels: Vec<u8> },
    /// The worker reported an inference failure
    Failed(String),
}

struct InFlight {
    id: u64,
    token: CancellationToken,
    posted_at: Instant,
}

/// Request/response state of one segmentation run on one slice.
pub struct SegmentationClient {
    embedding: EmbeddingHandle,
    frame: FrameGeometry,
    color: Rgba,
    /// Whether the worker already holds the embedding, frame and color
    primed: bool,
    in_flight: Option<InFlight>,
}

impl SegmentationClient {
    pub fn new(embedding: EmbeddingHandle, frame: FrameGeometry, color: Rgba) -> Self {
        Self {
            embedding,
            frame,
            color,
            primed: false,
            in_flight: None,
        }
    }

    /// Slice the embedding was computed for.
    pub fn slice(&self) -> usize {
        self.embedding.slice
    }

    pub fn frame(&self) -> &FrameGeometry {
        &self.frame
    }

    /// Whether a request is awaiting its response.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Id of the request awaiting its response.
    pub fn in_flight_id(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.id)
    }

    /// Request a live preview for `prompts`.
    pub fn run_inference(
        &mut self,
        pool: &mut WorkerPool,
        prompts: &[&Annotation],
        prior_mask: Option<Vec<f32>>,
    ) -> Result<u64> {
        self.submit(pool, prompts, prior_mask, None)
    }

    /// Request the thresholded mask for `prompts`, labelled `label`.
    pub fn finalize(&mut self, pool: &mut WorkerPool, prompts: &[&Annotation], label: u8) -> Result<u64> {
        self.submit(pool, prompts, None, Some(label))
    }

    fn submit(
        &mut self,
        pool: &mut WorkerPool,
        prompts: &[&Annotation],
        prior_mask: Option<Vec<f32>>,
        final_label: Option<u8>,
    ) -> Result<u64> {
        self.cancel();

        let id = pool.issue_id();
        let coords = prompts.iter().map(|a| WirePrompt::from(*a)).collect();
        let mut request = WorkerRequest {
            prior_mask,
            final_label,
            ..WorkerRequest::prompts(id, coords)
        };
        if !self.primed {
            request.embedding = Some(self.embedding.encoded().to_string());
            request.frame = Some(self.frame);
            request.color = Some(self.color);
        }

        pool.post(request)?;
        // The worker drops its embedding, frame and color after answering a final request
        self.primed = final_label.is_none();
        self.in_flight = Some(InFlight {
            id,
            token: CancellationToken::new(),
            posted_at: Instant::now(),
        });
        log::debug!(
            "Posted {} request {} with {} prompts",
            if final_label.is_some() { "final" } else { "preview" },
            id,
            prompts.len()
        );
        Ok(id)
    }

    /// Cancel the in-flight request; its response will be dropped.
    pub fn cancel(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            previous.token.cancel();
            log::debug!("Cancelled inference request {}", previous.id);
        }
    }

    /// Drain worker responses, keeping only the in-flight one.
    pub fn poll(&mut self, worker: &mut dyn InferenceWorker) -> Vec<ClientEvent> {
        let mut events = Vec::new();

        while let Some(response) = worker.take_one_result() {
            let current = self
                .in_flight
                .as_ref()
                .is_some_and(|f| f.id == response.id && !f.token.is_cancelled());
            if !current {
                log::debug!("Dropping stale inference response {}", response.id);
                continue;
            }
            if let Some(done) = self.in_flight.take() {
                log::debug!("Inference {} answered in {:?}", done.id, done.posted_at.elapsed());
            }

            match response.payload {
                WorkerPayload::Preview {
                    width,
                    height,
                    data,
                } => match RgbaImage::from_raw(width, height, data) {
                    Some(image) => events.push(ClientEvent::Preview(image)),
                    None => log::error!("Preview buffer does not match {}x{}", width, height),
                },
                WorkerPayload::Final(labels) => events.push(ClientEvent::Final {
                    slice: self.slice(),
                    labels,
                }),
                WorkerPayload::Error(message) => {
                    log::error!("Inference failed: {}", message);
                    events.push(ClientEvent::Failed(message));
                }
            }
        }
        events
    }
}
