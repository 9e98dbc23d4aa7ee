//! Background thread for slice pre-rasterization (native only).
//!
//! `PrerenderWorker` rasterizes every slice of a layer off the UI thread from
//! an immutable snapshot and hands the images back through a channel. The UI
//! side offers each result to [`SliceCache::insert_prerendered`], which drops
//! results whose generation or tag no longer match.
//!
//! [`SliceCache::insert_prerendered`]: crate::slice_cache::SliceCache::insert_prerendered

use image::RgbaImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::color::ColorTable;
use crate::error::{Result, ViewerError};
use crate::slice_cache::{LayerTag, rasterize_intensity, rasterize_labels};
use crate::view::{ImageWindow, MaskDisplay};
use crate::volume::{Orientation, VolumeBuffer, slice_shape};

/// Layer-specific inputs of a prerender job.
pub enum PrerenderSource {
    Image {
        volume: Arc<VolumeBuffer>,
        window: ImageWindow,
    },
    Mask {
        labels: Arc<VolumeBuffer>,
        table: ColorTable,
        display: MaskDisplay,
    },
}

impl PrerenderSource {
    fn tag(&self) -> LayerTag {
        match self {
            PrerenderSource::Image { window, .. } => LayerTag::Image(*window),
            PrerenderSource::Mask { display, .. } => LayerTag::Mask {
                alpha: display.alpha,
            },
        }
    }

    fn volume(&self) -> &VolumeBuffer {
        match self {
            PrerenderSource::Image { volume, .. } => volume,
            PrerenderSource::Mask { labels, .. } => labels,
        }
    }

    fn render(&self, orientation: Orientation, slice: usize) -> Result<RgbaImage> {
        match self {
            PrerenderSource::Image { volume, window } => {
                rasterize_intensity(volume, orientation, slice, *window)
            }
            PrerenderSource::Mask {
                labels,
                table,
                display,
            } => rasterize_labels(labels, orientation, slice, table, display),
        }
    }
}

/// Request to rasterize every slice of one layer.
pub struct PrerenderJob {
    pub source: PrerenderSource,
    pub orientation: Orientation,
    /// Cache generation the snapshot was taken at
    pub generation: u64,
    /// Slices already fresh in the cache
    pub skip: Vec<usize>,
}

/// One slice rendered in the background.
pub struct PrerenderedSlice {
    pub slice: usize,
    pub tag: LayerTag,
    pub generation: u64,
    pub image: RgbaImage,
}

enum ThreadMessage {
    Render(PrerenderJob),
    Shutdown,
}

/// Manages a background thread that pre-rasterizes slices.
pub struct PrerenderWorker {
    request_tx: Sender<ThreadMessage>,
    result_rx: Receiver<PrerenderedSlice>,
    thread_handle: Option<JoinHandle<()>>,
    /// Newest generation submitted; older jobs stop early
    latest_generation: Arc<AtomicU64>,
    pending_jobs: usize,
}

impl PrerenderWorker {
    /// Spawn the prerender thread.
    pub fn spawn() -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<ThreadMessage>();
        let (result_tx, result_rx) = mpsc::channel::<PrerenderedSlice>();
        let latest_generation = Arc::new(AtomicU64::new(0));
        let latest = Arc::clone(&latest_generation);

        let thread_handle = thread::Builder::new()
            .name("slice-prerender".to_string())
            .spawn(move || {
                log::info!("Slice prerender thread started");
                Self::thread_loop(request_rx, result_tx, latest);
                log::info!("Slice prerender thread exiting");
            })
            .map_err(|e| ViewerError::WorkerUnavailable(format!("prerender thread: {}", e)))?;

        Ok(Self {
            request_tx,
            result_rx,
            thread_handle: Some(thread_handle),
            latest_generation,
            pending_jobs: 0,
        })
    }

    fn thread_loop(
        request_rx: Receiver<ThreadMessage>,
        result_tx: Sender<PrerenderedSlice>,
        latest: Arc<AtomicU64>,
    ) {
        while let Ok(ThreadMessage::Render(job)) = request_rx.recv() {
            let tag = job.source.tag();
            let (_, _, depth) = slice_shape(job.source.volume(), job.orientation);
            let mut rendered = 0usize;

            for slice in (0..depth).filter(|s| !job.skip.contains(s)) {
                if latest.load(Ordering::Acquire) != job.generation {
                    log::debug!("Prerender job for generation {} superseded", job.generation);
                    break;
                }
                match job.source.render(job.orientation, slice) {
                    Ok(image) => {
                        let result = PrerenderedSlice {
                            slice,
                            tag,
                            generation: job.generation,
                            image,
                        };
                        if result_tx.send(result).is_err() {
                            log::warn!("Result channel closed, prerender thread exiting");
                            return;
                        }
                        rendered += 1;
                    }
                    Err(e) => log::error!("Failed to prerender slice {}: {}", slice, e),
                }
            }
            log::debug!("Prerendered {} slices ({:?})", rendered, tag);
        }
    }

    /// Queue a job. Jobs from earlier generations are abandoned.
    pub fn submit(&mut self, job: PrerenderJob) {
        self.latest_generation.store(job.generation, Ordering::Release);
        if self.request_tx.send(ThreadMessage::Render(job)).is_err() {
            log::error!("Failed to send prerender job: channel closed");
        } else {
            self.pending_jobs += 1;
        }
    }

    /// Take one rendered slice. Non-blocking.
    pub fn take_one_result(&mut self) -> Option<PrerenderedSlice> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Prerender thread disconnected");
                None
            }
        }
    }

    /// Number of jobs submitted so far.
    pub fn submitted_jobs(&self) -> usize {
        self.pending_jobs
    }
}

impl Drop for PrerenderWorker {
    fn drop(&mut self) {
        log::debug!("Shutting down prerender thread");
        self.latest_generation.store(u64::MAX, Ordering::Release);
        let _ = self.request_tx.send(ThreadMessage::Shutdown);

        if let Some(handle) = self.thread_handle.take()
            && let Err(e) = handle.join()
        {
            log::warn!("Prerender thread panicked: {:?}", e);
        }
    }
}
