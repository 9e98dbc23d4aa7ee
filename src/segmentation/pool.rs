//! Ownership and lifecycle of the inference worker.

use crate::config::ModelConfig;
use crate::error::{Result, ViewerError};
use crate::segmentation::protocol::WorkerRequest;
use crate::segmentation::worker::InferenceWorker;

/// Creates a worker for a model entry.
pub type WorkerFactory = Box<dyn FnMut(&ModelConfig) -> Result<Box<dyn InferenceWorker>>>;

/// Owns the worker of the selected model.
///
/// Selecting a model terminates the previous worker before spawning the new
/// one. Request ids are issued here so they stay monotonic across workers.
pub struct WorkerPool {
    models: Vec<ModelConfig>,
    factory: WorkerFactory,
    selected: Option<usize>,
    worker: Option<Box<dyn InferenceWorker>>,
    next_id: u64,
}

impl WorkerPool {
    pub fn new(models: Vec<ModelConfig>, factory: WorkerFactory) -> Self {
        Self {
            models,
            factory,
            selected: None,
            worker: None,
            next_id: 0,
        }
    }

    /// Switch to the model at `index`.
    pub fn set_model(&mut self, index: usize) -> Result<()> {
        let Some(model) = self.models.get(index).cloned() else {
            log::error!("Invalid model index {} ({} models)", index, self.models.len());
            return Err(ViewerError::InvalidModelSelection(index));
        };

        self.terminate();
        let worker = (self.factory)(&model)?;
        log::info!("Spawned inference worker '{}' ({})", model.worker, model.variant);
        self.worker = Some(worker);
        self.selected = Some(index);
        Ok(())
    }

    /// Selected model entry.
    pub fn model(&self) -> Option<&ModelConfig> {
        self.selected.and_then(|i| self.models.get(i))
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    /// Next request id. Ids start at 1 and never repeat.
    pub fn issue_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Post to the running worker.
    pub fn post(&mut self, request: WorkerRequest) -> Result<()> {
        match self.worker.as_mut() {
            Some(worker) => worker.post(request),
            None => Err(ViewerError::WorkerUnavailable("no model selected".to_string())),
        }
    }

    pub fn worker_mut(&mut self) -> Option<&mut (dyn InferenceWorker + 'static)> {
        self.worker.as_deref_mut()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop the running worker, if any.
    pub fn terminate(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.terminate();
        }
        self.selected = None;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}
