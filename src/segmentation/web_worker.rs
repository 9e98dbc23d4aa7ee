//! Web Worker transport for mask inference (WASM only)
//!
//! Requests are posted as JSON strings to a module worker running the model;
//! the worker answers with JSON-encoded [`WorkerResponse`]s, which are queued
//! until the UI polls them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{MessageEvent, Worker, WorkerOptions, WorkerType};

use crate::error::{Result, ViewerError};
use crate::segmentation::protocol::{WorkerRequest, WorkerResponse};
use crate::segmentation::worker::InferenceWorker;

/// Manages a Web Worker running the mask predictor.
pub struct WebInferenceWorker {
    worker: Worker,
    script: String,
    /// Responses waiting to be processed by the main thread
    results: Rc<RefCell<VecDeque<WorkerResponse>>>,
    terminated: bool,
    /// Closure stored to prevent deallocation
    _onmessage: Closure<dyn Fn(MessageEvent)>,
}

impl WebInferenceWorker {
    /// Spawn a module worker from `script`.
    pub fn spawn(script: &str) -> Result<Self> {
        let options = WorkerOptions::new();
        options.set_type(WorkerType::Module);

        let worker = Worker::new_with_options(script, &options)
            .map_err(|e| ViewerError::WorkerUnavailable(format!("{}: {:?}", script, e)))?;

        let results: Rc<RefCell<VecDeque<WorkerResponse>>> = Rc::new(RefCell::new(VecDeque::new()));
        let results_clone = Rc::clone(&results);

        let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
            let Some(text) = event.data().as_string() else {
                log::warn!("Inference worker sent a non-string message");
                return;
            };
            match serde_json::from_str::<WorkerResponse>(&text) {
                Ok(response) => results_clone.borrow_mut().push_back(response),
                Err(e) => log::warn!("Malformed inference worker response: {}", e),
            }
        }) as Box<dyn Fn(MessageEvent)>);

        worker.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        log::info!("🧠 Inference worker spawned from {}", script);

        Ok(Self {
            worker,
            script: script.to_string(),
            results,
            terminated: false,
            _onmessage: onmessage,
        })
    }

    /// Check if there are responses waiting to be processed.
    pub fn has_results(&self) -> bool {
        !self.results.borrow().is_empty()
    }
}

impl InferenceWorker for WebInferenceWorker {
    fn post(&mut self, request: WorkerRequest) -> Result<()> {
        if self.terminated {
            return Err(ViewerError::WorkerUnavailable(self.script.clone()));
        }
        let json = serde_json::to_string(&request)?;
        self.worker
            .post_message(&JsValue::from_str(&json))
            .map_err(|e| ViewerError::WorkerUnavailable(format!("{:?}", e)))
    }

    fn take_one_result(&mut self) -> Option<WorkerResponse> {
        self.results.borrow_mut().pop_front()
    }

    fn terminate(&mut self) {
        if !self.terminated {
            log::info!("Terminating inference worker {}", self.script);
            self.worker.set_onmessage(None);
            self.worker.terminate();
            self.terminated = true;
        }
    }
}

impl Drop for WebInferenceWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}
