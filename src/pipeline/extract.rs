//! Extraction coordinator: frame and audio dumps on background threads.

use super::backend::{ExitReport, MediaBackend};
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use mosaicforge_av::{CacheSet, FrameFormat};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Outcome of one extraction job.
pub type ExtractionResult = std::result::Result<ExitReport, String>;

/// Handle on the two background extraction jobs of a run.
///
/// Frame extraction completion is observable through [`completion`](Self::completion)
/// so the scheduler can wait on it alongside other signals. Neither job can be
/// cancelled.
pub struct ExtractionCoordinator {
    frames_rx: Receiver<ExtractionResult>,
    frames_result: Option<ExtractionResult>,
    frames_thread: Option<JoinHandle<()>>,
    audio_thread: Option<JoinHandle<ExtractionResult>>,
}

impl ExtractionCoordinator {
    /// Start frame and audio extraction for `input`.
    pub fn launch(
        backend: Arc<dyn MediaBackend>,
        input: PathBuf,
        frame_rate: u32,
        cache: CacheSet,
        format: FrameFormat,
    ) -> Result<Self> {
        let (frames_tx, frames_rx) = bounded(1);

        let frames_thread = {
            let backend = Arc::clone(&backend);
            let input = input.clone();
            let cache = cache.clone();
            thread::Builder::new()
                .name("extract-frames".to_string())
                .spawn(move || {
                    let result = backend
                        .extract_frames(&input, frame_rate, &cache, format)
                        .map_err(|e| e.to_string());
                    let _ = frames_tx.send(result);
                })?
        };

        let audio_thread = thread::Builder::new()
            .name("extract-audio".to_string())
            .spawn(move || {
                backend
                    .extract_audio(&input, &cache)
                    .map_err(|e| e.to_string())
            })?;

        Ok(Self {
            frames_rx,
            frames_result: None,
            frames_thread: Some(frames_thread),
            audio_thread: Some(audio_thread),
        })
    }

    /// Channel that yields the frame extraction result once.
    pub fn completion(&self) -> &Receiver<ExtractionResult> {
        &self.frames_rx
    }

    /// Store a result received from [`completion`](Self::completion).
    pub fn record(&mut self, result: ExtractionResult) {
        if self.frames_result.is_none() {
            self.frames_result = Some(result);
        }
    }

    /// Whether frame extraction has finished. Never blocks.
    pub fn frames_done(&mut self) -> bool {
        if self.frames_result.is_some() {
            return true;
        }
        match self.frames_rx.try_recv() {
            Ok(result) => {
                self.frames_result = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.frames_result = Some(Err("frame extraction thread panicked".to_string()));
                true
            }
        }
    }

    /// Block until frame extraction finishes and return its result.
    pub fn wait_frames(&mut self) -> &ExtractionResult {
        if self.frames_result.is_none() {
            let result = self
                .frames_rx
                .recv()
                .unwrap_or_else(|_| Err("frame extraction thread panicked".to_string()));
            self.frames_result = Some(result);
        }
        if let Some(handle) = self.frames_thread.take() {
            let _ = handle.join();
        }
        self.frames_result
            .get_or_insert_with(|| Err("frame extraction result missing".to_string()))
    }

    /// Block until audio extraction finishes and return its result.
    pub fn wait_audio(&mut self) -> ExtractionResult {
        match self.audio_thread.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err("audio extraction thread panicked".to_string())),
            None => Err("audio extraction already collected".to_string()),
        }
    }
}

impl Drop for ExtractionCoordinator {
    fn drop(&mut self) {
        // Extraction is bounded by the tool timeouts; join so no thread
        // outlives the run's cache.
        if let Some(handle) = self.frames_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Turn a frame extraction result into a log line, or an error when it
/// produced nothing usable.
pub fn check_frames(result: &ExtractionResult, frames_found: usize) -> Result<()> {
    match result {
        Ok(report) if report.success() => {}
        Ok(report) => tracing::warn!(
            "Frame extraction exited with {:?}: {}",
            report.code,
            report.stderr
        ),
        Err(e) => tracing::warn!("Frame extraction failed: {}", e),
    }

    if frames_found == 0 {
        let detail = match result {
            Ok(report) => format!("exit code {:?}: {}", report.code, report.stderr),
            Err(e) => e.clone(),
        };
        return Err(Error::external(
            "ffmpeg",
            format!("frame extraction produced no frames ({detail})"),
        ));
    }
    Ok(())
}
