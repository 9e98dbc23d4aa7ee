//! Top-level viewer session: one canvas pair, the inference worker, and at
//! most one active segmentation run.

use web_time::Instant;

use crate::annotation::{Annotation, AnnotationSession, Geometry, PromptLabel, overlay_svg};
use crate::config::{ModelConfig, ViewerConfig};
use crate::constants::toast;
use crate::error::{Result, ViewerError};
use crate::segmentation::{
    CancellationToken, ClientEvent, EmbeddingRequest, EmbeddingService, FrameGeometry,
    SegmentationClient, WorkerPool, request_embedding,
};
use crate::session::CanvasPairController;
use crate::volume::Orientation;

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub message: String,
    pub at: Instant,
}

/// State of the segmentation run in progress.
struct ActiveSegmentation {
    annotations: AnnotationSession,
    client: SegmentationClient,
    label: u8,
    orientation: Orientation,
    token: CancellationToken,
}

pub struct ViewerSession {
    config: ViewerConfig,
    /// Server-side path of the volume, sent with embedding requests
    path: String,
    pair: CanvasPairController,
    pool: WorkerPool,
    embeddings: Box<dyn EmbeddingService>,
    active: Option<ActiveSegmentation>,
    toasts: Vec<Toast>,
}

impl ViewerSession {
    /// Create the session and start the worker of the first model.
    pub fn new(
        config: ViewerConfig,
        path: impl Into<String>,
        pair: CanvasPairController,
        mut pool: WorkerPool,
        embeddings: Box<dyn EmbeddingService>,
    ) -> Result<Self> {
        if !pool.is_running() {
            pool.set_model(0)?;
        }
        Ok(Self {
            config,
            path: path.into(),
            pair,
            pool,
            embeddings,
            active: None,
            toasts: Vec::new(),
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn pair(&self) -> &CanvasPairController {
        &self.pair
    }

    pub fn pair_mut(&mut self) -> &mut CanvasPairController {
        &mut self.pair
    }

    pub fn model(&self) -> Option<&ModelConfig> {
        self.pool.model()
    }

    pub fn is_segmenting(&self) -> bool {
        self.active.is_some()
    }

    fn toast(&mut self, message: &str) {
        log::info!("Toast: {}", message);
        self.toasts.push(Toast {
            message: message.to_string(),
            at: Instant::now(),
        });
    }

    /// Drain queued toasts, oldest first.
    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    // ========================================================================
    // Model selection
    // ========================================================================

    /// Switch to the model at `index`, restarting the worker.
    pub fn select_model(&mut self, index: usize) -> Result<()> {
        if self.active.is_some() {
            self.toast(toast::FINISH_BEFORE_SWITCH);
            return Err(ViewerError::AnnotationInProgress);
        }
        if let Err(e) = self.pool.set_model(index) {
            self.toast(toast::INVALID_MODEL);
            return Err(e);
        }
        Ok(())
    }

    // ========================================================================
    // Segmentation lifecycle
    // ========================================================================

    /// Begin a segmentation run on the current slice, writing `label`.
    ///
    /// Fetches the slice embedding first; on failure no session is started.
    pub fn start_segmentation(&mut self, label: u32) -> Result<()> {
        if self.active.is_some() {
            self.toast(toast::FINISH_BEFORE_SWITCH);
            return Err(ViewerError::AnnotationInProgress);
        }
        let wire_label = u8::try_from(label).map_err(|_| ViewerError::InvalidLabel(label))?;
        if label == 0 || !self.pair.color_table().contains(label) {
            return Err(ViewerError::InvalidLabel(label));
        }
        let variant = self
            .pool
            .model()
            .map(|m| m.variant.clone())
            .ok_or_else(|| ViewerError::WorkerUnavailable("no model selected".to_string()))?;

        let view = self.pair.view();
        let window = view.window();
        let request = EmbeddingRequest {
            path: self.path.clone(),
            slice: view.slice(),
            ndim: view.mapping().slice + 1,
            min: window.min,
            max: window.max,
            model_variant: variant,
        };
        let t = view.transform();
        let frame = FrameGeometry {
            dx: t.pan_x,
            dy: t.pan_y,
            d_width: t.draw_width(),
            d_height: t.draw_height(),
            w: view.slice_width(),
            h: view.slice_height(),
        };
        let orientation = view.orientation();

        let token = CancellationToken::new();
        let embedding = match request_embedding(self.embeddings.as_ref(), &request, &token) {
            Ok(embedding) => embedding,
            Err(e) => {
                log::error!("Embedding request for slice {} failed: {}", request.slice, e);
                return Err(e);
            }
        };

        log::info!(
            "🧠 Segmentation started on {} slice {} with label {}",
            orientation.name(),
            request.slice,
            label
        );
        self.active = Some(ActiveSegmentation {
            annotations: AnnotationSession::new(),
            client: SegmentationClient::new(embedding, frame, self.config.preview_color),
            label: wire_label,
            orientation,
            token,
        });
        Ok(())
    }

    fn active_mut(&mut self) -> Result<&mut ActiveSegmentation> {
        self.active.as_mut().ok_or(ViewerError::NoActiveSession)
    }

    /// Ask for a new preview from the committed annotations.
    fn run_inference(&mut self) -> Result<()> {
        let active = self.active.as_mut().ok_or(ViewerError::NoActiveSession)?;
        let prompts = active.annotations.committed_annotations();
        if prompts.is_empty() {
            active.client.cancel();
            self.pair.clear_preview();
            return Ok(());
        }
        active.client.run_inference(&mut self.pool, &prompts, None)?;
        Ok(())
    }

    fn report(&mut self, error: &ViewerError, off_image: &str) {
        match error {
            ViewerError::OutOfBounds { .. } => self.toast(off_image),
            ViewerError::DuplicateAnnotation { .. } => self.toast(toast::DUPLICATE),
            _ => {}
        }
    }

    /// Whether the view shows the slice and orientation the run was started on.
    fn shows_run_slice(&self) -> bool {
        self.active.as_ref().is_some_and(|active| {
            let view = self.pair.view();
            view.orientation() == active.orientation && view.slice() == active.client.slice()
        })
    }

    /// Prompts are only accepted on the slice the embedding was computed for.
    fn ensure_run_slice(&mut self) -> Result<()> {
        let run = self.active.as_ref().ok_or(ViewerError::NoActiveSession)?.client.slice();
        if self.shows_run_slice() {
            return Ok(());
        }
        let shown = self.pair.view().slice();
        self.toast(toast::WRONG_SLICE);
        Err(ViewerError::SliceMismatch { run, shown })
    }

    /// Place a point prompt at a canvas offset and re-run inference.
    pub fn click_point(&mut self, offset_x: f64, offset_y: f64) -> Result<()> {
        self.ensure_run_slice()?;
        let view = self.pair.view();
        let result = self
            .active
            .as_mut()
            .ok_or(ViewerError::NoActiveSession)?
            .annotations
            .start_point(view, offset_x, offset_y)
            .map(|_| ());
        if let Err(e) = result {
            self.report(&e, toast::POINT_OFF_IMAGE);
            return Err(e);
        }
        self.run_inference()
    }

    /// Anchor the first corner of a box prompt.
    pub fn start_rect(&mut self, offset_x: f64, offset_y: f64) -> Result<()> {
        self.ensure_run_slice()?;
        let view = self.pair.view();
        let result = self
            .active
            .as_mut()
            .ok_or(ViewerError::NoActiveSession)?
            .annotations
            .start_rect(view, offset_x, offset_y);
        if let Err(e) = &result {
            self.report(e, toast::RECT_OFF_IMAGE);
        }
        result
    }

    /// Live-preview the anchored box under the cursor.
    pub fn drag(&mut self, offset_x: f64, offset_y: f64) -> Option<Geometry> {
        if !self.shows_run_slice() {
            return None;
        }
        let view = self.pair.view();
        self.active
            .as_mut()?
            .annotations
            .update_rect_drag(view, offset_x, offset_y)
    }

    /// Place the second corner of the anchored box and re-run inference.
    pub fn commit_rect(&mut self, offset_x: f64, offset_y: f64) -> Result<()> {
        self.ensure_run_slice()?;
        let view = self.pair.view();
        let result = self
            .active
            .as_mut()
            .ok_or(ViewerError::NoActiveSession)?
            .annotations
            .commit_rect(view, offset_x, offset_y)
            .map(|_| ());
        if let Err(e) = result {
            self.report(&e, toast::RECT_OFF_IMAGE);
            return Err(e);
        }
        self.run_inference()
    }

    /// Flip the label of the next prompt.
    pub fn toggle_label(&mut self) -> Result<PromptLabel> {
        Ok(self.active_mut()?.annotations.toggle_label())
    }

    /// Remove the most recent prompt and refresh the preview.
    pub fn undo(&mut self) -> Result<Option<Annotation>> {
        let removed = self.active_mut()?.annotations.undo_last();
        if removed.as_ref().is_some_and(|a| a.committed) {
            self.run_inference()?;
        }
        Ok(removed)
    }

    /// Remove every prompt of the run, keeping the run open.
    pub fn reset_annotations(&mut self) -> Result<()> {
        let active = self.active_mut()?;
        active.annotations.reset();
        active.client.cancel();
        self.pair.clear_preview();
        self.toast(toast::RESTART);
        Ok(())
    }

    /// Re-run inference with the current prompts.
    pub fn once_more(&mut self) -> Result<()> {
        self.run_inference()
    }

    /// Request the final mask. The run ends when it arrives in [`pump`].
    ///
    /// With no prompts the run is ended immediately.
    ///
    /// [`pump`]: ViewerSession::pump
    pub fn finish(&mut self) -> Result<()> {
        let active = self.active.as_mut().ok_or(ViewerError::NoActiveSession)?;
        let prompts = active.annotations.committed_annotations();
        if prompts.is_empty() {
            self.abort();
            return Ok(());
        }
        let label = active.label;
        active.client.finalize(&mut self.pool, &prompts, label)?;
        Ok(())
    }

    fn end_session(&mut self) -> Vec<Annotation> {
        let Some(mut active) = self.active.take() else {
            return Vec::new();
        };
        active.token.cancel();
        active.client.cancel();
        self.pair.clear_preview();
        active
            .annotations
            .committed_annotations()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Cancel the run, returning its committed prompts.
    pub fn abort(&mut self) -> Vec<Annotation> {
        if self.active.is_none() {
            return Vec::new();
        }
        let committed = self.end_session();
        self.toast(toast::SESSION_ENDED);
        committed
    }

    /// Resize the canvases. An active run is aborted.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.active.is_some() {
            self.toast(toast::RESIZE_ABORT);
            self.end_session();
        }
        self.pair.resize_canvas(width, height);
    }

    // ========================================================================
    // Event pump
    // ========================================================================

    /// Apply worker responses. Call once per animation frame before drawing.
    pub fn pump(&mut self) -> Result<()> {
        let Some(worker) = self.pool.worker_mut() else {
            return Ok(());
        };
        let Some(active) = self.active.as_mut() else {
            while let Some(response) = worker.take_one_result() {
                log::debug!("Dropping response {} outside a segmentation run", response.id);
            }
            return Ok(());
        };

        let (orientation, run_slice) = (active.orientation, active.client.slice());
        for event in active.client.poll(worker) {
            match event {
                ClientEvent::Preview(image) => self.pair.show_preview(orientation, run_slice, image),
                ClientEvent::Final { slice, labels } => {
                    self.end_session();
                    self.pair.commit_labels(orientation, slice, &labels)?;
                    self.toast(toast::SESSION_ENDED);
                    return Ok(());
                }
                ClientEvent::Failed(message) => {
                    log::error!("Segmentation failed: {}", message);
                    self.toast(toast::INFERENCE_FAILED);
                }
            }
        }
        Ok(())
    }

    /// Pump worker responses and redraw if needed.
    pub fn on_animation_frame(&mut self) -> Result<bool> {
        self.pump()?;
        self.pair.on_animation_frame()
    }

    /// SVG overlay of the prompts of the active run.
    pub fn overlay_svg(&self) -> Result<Option<String>> {
        let Some(active) = self.active.as_ref() else {
            return Ok(None);
        };
        let (width, height) = self.pair.view().canvas_size();
        overlay_svg(active.annotations.all_annotations(), width, height).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{FixedEmbeddings, Script, WorkerPayload, WorkerResponse, scripted_pool};
    use crate::view::SliceStep;
    use crate::volume::{Datatype, VolumeBuffer, VolumeHeader, VolumeKind, read_labels};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session_with(embeddings: FixedEmbeddings) -> (ViewerSession, Rc<RefCell<Script>>) {
        let header = VolumeHeader::new([10, 10, 4], Datatype::U8).with_cal_range(0.0, 100.0);
        let volume = VolumeBuffer::new(header, VolumeKind::Intensity, vec![50; 400]).unwrap();
        let config = ViewerConfig::new();
        let pair = CanvasPairController::new(volume, None, &config, 100, 100).unwrap();
        let (pool, script) = scripted_pool();
        let session =
            ViewerSession::new(config, "ct.nii.gz", pair, pool, Box::new(embeddings)).unwrap();
        (session, script)
    }

    fn session() -> (ViewerSession, Rc<RefCell<Script>>) {
        session_with(FixedEmbeddings::new())
    }

    fn preview(id: u64, rgba: [u8; 4]) -> WorkerResponse {
        WorkerResponse {
            id,
            payload: WorkerPayload::Preview {
                width: 10,
                height: 10,
                data: rgba.repeat(100),
            },
        }
    }

    fn messages(session: &mut ViewerSession) -> Vec<String> {
        session.take_toasts().into_iter().map(|t| t.message).collect()
    }

    #[test]
    fn test_start_rejects_bad_labels() {
        let (mut session, _) = session();
        assert!(matches!(session.start_segmentation(0), Err(ViewerError::InvalidLabel(0))));
        assert!(matches!(session.start_segmentation(9), Err(ViewerError::InvalidLabel(9))));
        assert!(matches!(session.start_segmentation(300), Err(ViewerError::InvalidLabel(300))));
        assert!(!session.is_segmenting());
    }

    #[test]
    fn test_upstream_failure_starts_nothing() {
        let mut embeddings = FixedEmbeddings::new();
        embeddings.fail = true;
        let (mut session, _) = session_with(embeddings);
        assert!(matches!(session.start_segmentation(1), Err(ViewerError::UpstreamService(_))));
        assert!(!session.is_segmenting());
    }

    #[test]
    fn test_second_start_and_model_switch_blocked() {
        let (mut session, _) = session();
        session.start_segmentation(1).unwrap();
        assert!(session.start_segmentation(2).is_err());
        assert!(session.select_model(0).is_err());
        assert_eq!(
            messages(&mut session),
            vec![toast::FINISH_BEFORE_SWITCH, toast::FINISH_BEFORE_SWITCH]
        );
    }

    #[test]
    fn test_invalid_model_toasts() {
        let (mut session, _) = session();
        assert!(matches!(session.select_model(4), Err(ViewerError::InvalidModelSelection(4))));
        assert_eq!(messages(&mut session), vec![toast::INVALID_MODEL]);
    }

    #[test]
    fn test_off_image_point_toasts() {
        let (mut session, script) = session();
        session.start_segmentation(1).unwrap();
        assert!(session.click_point(-5.0, 10.0).is_err());
        assert_eq!(messages(&mut session), vec![toast::POINT_OFF_IMAGE]);
        assert!(script.borrow().posted.is_empty());
    }

    #[test]
    fn test_duplicate_rect_keeps_one_committed() {
        let (mut session, script) = session();
        session.start_segmentation(1).unwrap();

        session.start_rect(10.0, 10.0).unwrap();
        session.drag(40.0, 40.0);
        session.commit_rect(55.0, 55.0).unwrap();
        session.start_rect(10.0, 10.0).unwrap();
        assert!(matches!(
            session.commit_rect(55.0, 55.0),
            Err(ViewerError::DuplicateAnnotation { .. })
        ));

        assert_eq!(messages(&mut session), vec![toast::DUPLICATE]);
        assert_eq!(script.borrow().posted.len(), 1);
        let aborted = session.abort();
        assert_eq!(aborted.len(), 1);
        assert_eq!(aborted[0].geometry.values(), vec![1, 1, 5, 5]);
    }

    #[test]
    fn test_stale_preview_never_reaches_mask_canvas() {
        let (mut session, script) = session();
        session.start_segmentation(1).unwrap();
        session.on_animation_frame().unwrap();

        session.click_point(15.0, 15.0).unwrap();
        session.click_point(75.0, 75.0).unwrap();
        let (first, second) = {
            let s = script.borrow();
            (s.posted[0].id, s.posted[1].id)
        };
        assert!(s_has_embedding_once(&script.borrow()));

        script.borrow_mut().responses.push_back(preview(first, [255, 0, 255, 255]));
        session.on_animation_frame().unwrap();
        assert!(session.pair().preview().is_none());
        assert_eq!(session.pair().canvases().mask.pixels().get_pixel(50, 50).0[3], 0);

        script.borrow_mut().responses.push_back(preview(second, [0, 255, 0, 128]));
        session.on_animation_frame().unwrap();
        assert_eq!(
            session.pair().canvases().mask.pixels().get_pixel(50, 50).0,
            [0, 255, 0, 128]
        );
    }

    fn s_has_embedding_once(script: &Script) -> bool {
        script.posted.iter().filter(|r| r.embedding.is_some()).count() == 1
    }

    #[test]
    fn test_finish_writes_labels_and_ends_run() {
        let (mut session, script) = session();
        session.start_segmentation(2).unwrap();
        session.click_point(5.0, 5.0).unwrap();
        session.finish().unwrap();

        let (id, final_label) = {
            let s = script.borrow();
            let last = &s.posted[s.posted.len() - 1];
            (last.id, last.final_label)
        };
        assert_eq!(final_label, Some(2));

        let mut labels = vec![0u8; 100];
        labels[0] = 2;
        script.borrow_mut().responses.push_back(WorkerResponse {
            id,
            payload: WorkerPayload::Final(labels),
        });
        session.on_animation_frame().unwrap();

        assert!(!session.is_segmenting());
        assert_eq!(messages(&mut session), vec![toast::SESSION_ENDED]);
        let view = session.pair().view();
        let written = read_labels(session.pair().labels(), view.orientation(), view.slice()).unwrap();
        assert_eq!(written[0], 2);
        assert_eq!(
            session.pair().canvases().mask.pixels().get_pixel(0, 0).0,
            [0, 0, 255, 255]
        );
    }

    #[test]
    fn test_undo_last_prompt_clears_preview() {
        let (mut session, script) = session();
        session.start_segmentation(1).unwrap();
        session.click_point(5.0, 5.0).unwrap();
        let id = script.borrow().posted[0].id;
        script.borrow_mut().responses.push_back(preview(id, [0, 255, 0, 128]));
        session.pump().unwrap();
        assert!(session.pair().preview().is_some());

        let removed = session.undo().unwrap();
        assert!(removed.is_some());
        assert!(session.pair().preview().is_none());
        assert_eq!(script.borrow().posted.len(), 1);
    }

    #[test]
    fn test_resize_aborts_run() {
        let (mut session, _) = session();
        session.start_segmentation(1).unwrap();
        session.click_point(5.0, 5.0).unwrap();
        session.resize(200, 100);

        assert!(!session.is_segmenting());
        assert_eq!(messages(&mut session), vec![toast::RESIZE_ABORT]);
        assert_eq!(session.pair().canvases().image.width(), 200);
        assert!(matches!(session.click_point(5.0, 5.0), Err(ViewerError::NoActiveSession)));
    }

    #[test]
    fn test_overlay_lists_prompts() {
        let (mut session, _) = session();
        assert!(session.overlay_svg().unwrap().is_none());
        session.start_segmentation(1).unwrap();
        session.click_point(5.0, 5.0).unwrap();
        session.toggle_label().unwrap();
        session.click_point(25.0, 5.0).unwrap();

        let svg = session.overlay_svg().unwrap().unwrap();
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains("red"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn thread_session() -> ViewerSession {
        use crate::segmentation::{BoxPredictor, InferenceWorker, ThreadWorker, WorkerFactory};

        let header = VolumeHeader::new([10, 10, 4], Datatype::U8).with_cal_range(0.0, 100.0);
        let volume = VolumeBuffer::new(header, VolumeKind::Intensity, vec![50; 400]).unwrap();
        let config = ViewerConfig::new();
        let pair = CanvasPairController::new(volume, None, &config, 100, 100).unwrap();
        let factory: WorkerFactory = Box::new(|model: &ModelConfig| {
            Ok(Box::new(ThreadWorker::spawn(&model.worker, BoxPredictor::new())?)
                as Box<dyn InferenceWorker>)
        });
        let pool = WorkerPool::new(config.models.clone(), factory);
        ViewerSession::new(
            config,
            "ct.nii.gz",
            pair,
            pool,
            Box::new(FixedEmbeddings::new()),
        )
        .unwrap()
    }

    /// Pump until `done` holds or two seconds pass.
    #[cfg(not(target_arch = "wasm32"))]
    fn pump_until(session: &mut ViewerSession, done: impl Fn(&ViewerSession) -> bool) {
        for _ in 0..400 {
            session.pump().unwrap();
            if done(session) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_thread_worker_end_to_end() {
        let mut session = thread_session();

        session.start_segmentation(3).unwrap();
        session.click_point(5.0, 5.0).unwrap();
        session.click_point(25.0, 25.0).unwrap();

        pump_until(&mut session, |s| s.pair().preview().is_some());
        let preview = session.pair().preview().unwrap();
        assert_eq!(preview.get_pixel(2, 2).0, [0, 255, 0, 128]);
        assert_eq!(preview.get_pixel(3, 3).0[3], 0);

        session.finish().unwrap();
        pump_until(&mut session, |s| !s.is_segmenting());
        assert!(!session.is_segmenting());

        let view = session.pair().view();
        let labels = read_labels(session.pair().labels(), view.orientation(), view.slice()).unwrap();
        assert_eq!((labels[0], labels[22], labels[33]), (3, 3, 0));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_prompt_after_unpumped_finish_keeps_run_alive() {
        let mut session = thread_session();

        session.start_segmentation(3).unwrap();
        session.click_point(5.0, 5.0).unwrap();
        session.finish().unwrap();
        // Let the worker answer the final request and drop its state
        std::thread::sleep(std::time::Duration::from_millis(300));

        session.click_point(25.0, 25.0).unwrap();
        pump_until(&mut session, |s| s.pair().preview().is_some());
        assert!(session.is_segmenting());
        let preview = session.pair().preview().unwrap();
        assert_eq!(preview.get_pixel(2, 2).0, [0, 255, 0, 128]);

        session.finish().unwrap();
        pump_until(&mut session, |s| !s.is_segmenting());
        assert!(!session.is_segmenting());

        let view = session.pair().view();
        let labels = read_labels(session.pair().labels(), view.orientation(), view.slice()).unwrap();
        assert_eq!((labels[0], labels[22], labels[33]), (3, 3, 0));
    }

    #[test]
    fn test_prompts_locked_to_run_slice() {
        let (mut session, script) = session();
        session.start_segmentation(1).unwrap();
        let run_slice = session.pair().view().slice();
        session.click_point(25.0, 25.0).unwrap();
        let id = script.borrow().posted[0].id;

        session.pair_mut().change_slice(SliceStep::Delta(1));
        assert!(matches!(
            session.click_point(25.0, 25.0),
            Err(ViewerError::SliceMismatch { run, shown }) if run == run_slice && shown == run_slice + 1
        ));
        assert!(session.start_rect(10.0, 10.0).is_err());
        assert!(session.drag(20.0, 20.0).is_none());
        assert_eq!(messages(&mut session), vec![toast::WRONG_SLICE, toast::WRONG_SLICE]);
        assert_eq!(script.borrow().posted.len(), 1);

        script.borrow_mut().responses.push_back(preview(id, [0, 255, 0, 128]));
        session.on_animation_frame().unwrap();
        assert!(session.pair().preview().is_none());
        assert_eq!(session.pair().canvases().mask.pixels().get_pixel(50, 50).0[3], 0);

        session.pair_mut().change_slice(SliceStep::Delta(-1));
        session.on_animation_frame().unwrap();
        assert_eq!(
            session.pair().canvases().mask.pixels().get_pixel(50, 50).0,
            [0, 255, 0, 128]
        );
        session.click_point(75.0, 75.0).unwrap();
        assert_eq!(script.borrow().posted.len(), 2);
    }

    #[test]
    fn test_reset_annotations_keeps_run() {
        let (mut session, _) = session();
        session.start_segmentation(1).unwrap();
        session.click_point(5.0, 5.0).unwrap();
        session.reset_annotations().unwrap();
        assert!(session.is_segmenting());
        assert_eq!(messages(&mut session), vec![toast::RESTART]);
        assert!(session.abort().is_empty());
    }
}
