//! Concurrent video-to-mosaic conversion.
//!
//! A [`Pipeline`] overlaps ffmpeg frame extraction with a [`TransformPool`]
//! of mosaic workers, merges their progress into [`ProgressEvent`]s and
//! re-encodes the transformed frames. Per-frame failures are recorded as
//! [`JobOutcome`]s and handled at reassembly by a [`MissingFramePolicy`].

mod aggregator;
mod backend;
mod events;
mod extract;
mod pool;
mod reassemble;
mod scheduler;
mod watch;

pub use aggregator::Aggregator;
pub use backend::{ExitReport, FfmpegBackend, MediaBackend};
pub use events::{
    ProgressEvent, ProgressSink, EXTRACTION_DONE, REASSEMBLY_DONE, RUN_DONE, TRANSFORM_DONE,
};
pub use extract::{ExtractionCoordinator, ExtractionResult};
pub use pool::{JobHandle, JobOutcome, PoolEvent, TransformPool, MAX_WORKERS};
pub use reassemble::{apply_policy, MissingFramePolicy};
pub use scheduler::{FrameFailure, Phase, Pipeline, PipelineSettings, RunReport};
