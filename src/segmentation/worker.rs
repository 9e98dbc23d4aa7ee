//! Inference worker transport.
//!
//! An `InferenceWorker` accepts [`WorkerRequest`]s and yields
//! [`WorkerResponse`]s without blocking the UI thread. On native targets the
//! worker is a background thread owning a [`PromptedPredictor`]; in the
//! browser it is a Web Worker (see `web_worker`).

use crate::error::Result;
use crate::segmentation::protocol::{WorkerRequest, WorkerResponse};

/// Message-passing handle to a running inference worker.
pub trait InferenceWorker {
    /// Post a request. Never blocks on inference.
    fn post(&mut self, request: WorkerRequest) -> Result<()>;

    /// Take one response if available. Non-blocking.
    fn take_one_result(&mut self) -> Option<WorkerResponse>;

    /// Stop the worker. Further posts fail.
    fn terminate(&mut self);
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::ThreadWorker;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use web_time::Instant;

    use super::InferenceWorker;
    use crate::error::{Result, ViewerError};
    use crate::segmentation::predictor::{MaskPredictor, PromptedPredictor};
    use crate::segmentation::protocol::{WorkerPayload, WorkerRequest, WorkerResponse};

    enum ThreadMessage {
        Infer(WorkerRequest),
        Shutdown,
    }

    /// Background thread running a mask predictor.
    ///
    /// Requests older than the newest posted id only update the stored
    /// prompt state; their inference is skipped.
    pub struct ThreadWorker {
        request_tx: Sender<ThreadMessage>,
        result_rx: Receiver<WorkerResponse>,
        thread_handle: Option<JoinHandle<()>>,
        latest_id: Arc<AtomicU64>,
        name: String,
    }

    impl ThreadWorker {
        /// Spawn a worker thread around `predictor`.
        pub fn spawn<P: MaskPredictor + 'static>(name: &str, predictor: P) -> Result<Self> {
            let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
            let (result_tx, result_rx) = mpsc::channel::<WorkerResponse>();
            let latest_id = Arc::new(AtomicU64::new(0));
            let latest = Arc::clone(&latest_id);
            let thread_name = name.to_string();

            let thread_handle = thread::Builder::new()
                .name(format!("inference-{}", name))
                .spawn(move || {
                    log::info!("🧠 Inference worker '{}' started", thread_name);
                    Self::thread_loop(PromptedPredictor::new(predictor), request_rx, result_tx, latest);
                    log::info!("🧠 Inference worker '{}' exiting", thread_name);
                })
                .map_err(|e| ViewerError::WorkerUnavailable(format!("{}: {}", name, e)))?;

            Ok(Self {
                request_tx,
                result_rx,
                thread_handle: Some(thread_handle),
                latest_id,
                name: name.to_string(),
            })
        }

        fn thread_loop<P: MaskPredictor>(
            mut state: PromptedPredictor<P>,
            request_rx: Receiver<ThreadMessage>,
            result_tx: Sender<WorkerResponse>,
            latest: Arc<AtomicU64>,
        ) {
            while let Ok(ThreadMessage::Infer(request)) = request_rx.recv() {
                let id = request.id;

                if id < latest.load(Ordering::Acquire) {
                    log::debug!("Skipping superseded inference request {}", id);
                    if let Err(e) = state.absorb(&request) {
                        log::error!("Failed to apply request {}: {}", id, e);
                    }
                    continue;
                }

                let started = Instant::now();
                let payload = match state.handle(&request) {
                    Ok(Some(payload)) => payload,
                    Ok(None) => continue,
                    Err(e) => WorkerPayload::Error(e.to_string()),
                };
                log::debug!("Inference {} took {:?}", id, started.elapsed());

                if result_tx.send(WorkerResponse { id, payload }).is_err() {
                    log::warn!("Result channel closed, inference worker exiting");
                    break;
                }
            }
        }

        pub fn name(&self) -> &str {
            &self.name
        }
    }

    impl InferenceWorker for ThreadWorker {
        fn post(&mut self, request: WorkerRequest) -> Result<()> {
            self.latest_id.fetch_max(request.id, Ordering::AcqRel);
            self.request_tx
                .send(ThreadMessage::Infer(request))
                .map_err(|_| ViewerError::WorkerUnavailable(self.name.clone()))
        }

        fn take_one_result(&mut self) -> Option<WorkerResponse> {
            match self.result_rx.try_recv() {
                Ok(response) => Some(response),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Inference worker '{}' disconnected", self.name);
                    None
                }
            }
        }

        fn terminate(&mut self) {
            let _ = self.request_tx.send(ThreadMessage::Shutdown);
            if let Some(handle) = self.thread_handle.take() {
                log::info!("Terminating inference worker '{}'", self.name);
                if let Err(e) = handle.join() {
                    log::warn!("Inference worker panicked: {:?}", e);
                }
            }
        }
    }

    impl Drop for ThreadWorker {
        fn drop(&mut self) {
            self.terminate();
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
pub(crate) mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::segmentation::predictor::tests::{BoxPredictor, encoded_embedding};
    use crate::segmentation::protocol::{FrameGeometry, WirePrompt, WorkerPayload};
    use std::time::Duration;

    /// Poll until a response arrives or a second passes.
    pub(crate) fn wait_one(worker: &mut dyn InferenceWorker) -> Option<WorkerResponse> {
        for _ in 0..200 {
            if let Some(response) = worker.take_one_result() {
                return Some(response);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    fn request(id: u64) -> WorkerRequest {
        WorkerRequest {
            embedding: Some(encoded_embedding()),
            frame: Some(FrameGeometry {
                dx: 0.0,
                dy: 0.0,
                d_width: 2.0,
                d_height: 2.0,
                w: 2,
                h: 2,
            }),
            color: Some(Rgba::new(0, 255, 0, 128)),
            ..WorkerRequest::prompts(
                id,
                vec![WirePrompt {
                    ent: "pt".to_string(),
                    val: vec![0.0, 0.0],
                    label: 1,
                }],
            )
        }
    }

    #[test]
    fn test_thread_worker_round_trip() {
        let mut worker = ThreadWorker::spawn("test", BoxPredictor::new()).unwrap();
        worker.post(request(1)).unwrap();
        let response = wait_one(&mut worker).unwrap();
        assert_eq!(response.id, 1);
        assert!(matches!(response.payload, WorkerPayload::Preview { width: 2, height: 2, .. }));
        assert_eq!(worker.name(), "test");
    }

    #[test]
    fn test_post_after_terminate_fails() {
        let mut worker = ThreadWorker::spawn("test", BoxPredictor::new()).unwrap();
        worker.terminate();
        assert!(worker.post(request(1)).is_err());
    }
}
