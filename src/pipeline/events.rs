//! Unified progress events delivered to a [`ProgressSink`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `ExtractionProgress` marker: extraction finished and the overlap drained.
pub const EXTRACTION_DONE: f64 = 1.0;
/// `ExtractionProgress` marker: every transform job has finished.
pub const TRANSFORM_DONE: f64 = 1.4;
/// `ExtractionProgress` marker: the output video has been encoded.
pub const REASSEMBLY_DONE: f64 = 1.8;
/// `ExtractionProgress` marker: staging files removed, run complete.
pub const RUN_DONE: f64 = 2.0;

/// A progress event emitted by a pipeline run.
///
/// Events from one source arrive in order. Interleaving between extraction
/// progress and frame completions is best effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ProgressEvent {
    /// Expected (or corrected) number of frames.
    FrameCountKnown(u32),
    /// `0.0..=1.0` while extracting; `1.0..=2.0` marks later phases.
    ExtractionProgress(f64),
    /// One frame finished; carries the transformed frame if it succeeded.
    FrameDone(Option<PathBuf>),
    /// Progress of a single frame in percent.
    SingleFrameSubProgress(f64),
}

impl ProgressEvent {
    /// Event name as used by progress consumers.
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::FrameCountKnown(_) => "FrameCountKnown",
            ProgressEvent::ExtractionProgress(_) => "ExtractionProgress",
            ProgressEvent::FrameDone(_) => "FrameDone",
            ProgressEvent::SingleFrameSubProgress(_) => "SingleFrameSubProgress",
        }
    }

    /// Event payload as JSON.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            ProgressEvent::FrameCountKnown(n) => serde_json::json!(n),
            ProgressEvent::ExtractionProgress(f) => serde_json::json!(f),
            ProgressEvent::FrameDone(path) => serde_json::json!(path),
            ProgressEvent::SingleFrameSubProgress(p) => serde_json::json!(p),
        }
    }
}

/// Receiver of pipeline progress (CLI bars, JSON lines, tests).
pub trait ProgressSink: Send {
    fn emit(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent) + Send,
{
    fn emit(&mut self, event: ProgressEvent) {
        self(event)
    }
}
