//! Segmentation worker protocol, transport and client.

mod cancel;
mod client;
mod embedding;
mod pool;
mod predictor;
mod protocol;
mod worker;

#[cfg(target_arch = "wasm32")]
mod web_worker;

pub use cancel::CancellationToken;
pub use client::{ClientEvent, SegmentationClient};
pub use embedding::{
    EmbeddingHandle, EmbeddingService, decode_embedding, encode_embedding, request_embedding,
};
pub use pool::{WorkerFactory, WorkerPool};
pub use predictor::{MaskPredictor, PromptInput, PromptedPredictor};
pub use protocol::{
    EmbeddingRequest, EmbeddingResponse, FrameGeometry, WirePrompt, WorkerPayload, WorkerRequest,
    WorkerResponse, encode_prompts,
};
pub use worker::InferenceWorker;

#[cfg(not(target_arch = "wasm32"))]
pub use worker::ThreadWorker;

#[cfg(target_arch = "wasm32")]
pub use web_worker::WebInferenceWorker;

#[cfg(test)]
pub(crate) use embedding::tests::FixedEmbeddings;
#[cfg(test)]
pub(crate) use pool::tests::{Script, scripted_pool};
#[cfg(test)]
pub(crate) use predictor::tests::BoxPredictor;
