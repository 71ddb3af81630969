//! The pipeline state machine.
//!
//! ```text
//! Init -> OverlappedExtractAndTransform -> DrainOverlap -> RemainderTransform
//!      -> WaitPoolDrain -> Reassemble -> Cleanup -> Done
//! ```
//!
//! Everything in this module runs on the caller's thread. Extraction runs on
//! two background threads and transforms on the [`TransformPool`]; the
//! scheduler only waits on them with bounded timeouts and never cancels them.

use super::aggregator::Aggregator;
use super::backend::{ExitReport, MediaBackend};
use super::events::{ProgressSink, EXTRACTION_DONE, REASSEMBLY_DONE, RUN_DONE, TRANSFORM_DONE};
use super::extract::{check_frames, ExtractionCoordinator, ExtractionResult};
use super::pool::{JobHandle, JobOutcome, PoolEvent, TransformPool};
use super::reassemble::{apply_policy, MissingFramePolicy};
use super::watch::{RawCacheWatcher, RelistSchedule};
use crate::config::Config;
use crate::{Error, Result};
use crossbeam_channel::select;
use mosaicforge_av::actions::ReassembleSettings;
use mosaicforge_av::{expected_frame_count, list_frames, CacheSet, FrameFormat};
use mosaicforge_tiles::{
    CropRect, FrameTransform, ScaleSpec, TransformJob, TransformKind, TransformOptions,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    OverlappedExtractAndTransform,
    DrainOverlap,
    RemainderTransform,
    WaitPoolDrain,
    Reassemble,
    Cleanup,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::OverlappedExtractAndTransform => "overlapped extract and transform",
            Phase::DrainOverlap => "drain overlap",
            Phase::RemainderTransform => "remainder transform",
            Phase::WaitPoolDrain => "wait pool drain",
            Phase::Reassemble => "reassemble",
            Phase::Cleanup => "cleanup",
            Phase::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Tuning for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Requested worker count; the pool clamps it to `1..=16`.
    pub process_count: usize,
    pub frame_rate: u32,
    /// Extract lossless intermediate frames.
    pub quality: bool,
    /// Fraction of expected frames that ends the overlap phase.
    pub overlap_threshold: f64,
    /// Raw-cache recount interval without filesystem events.
    pub poll_interval: Duration,
    /// Wait slice for pool events and job results.
    pub event_poll: Duration,
    /// Pool idle time after which outstanding jobs are stalled.
    pub job_timeout: Duration,
    pub missing_frames: MissingFramePolicy,
    pub crf: u8,
    pub kind: TransformKind,
    pub scale: ScaleSpec,
    pub crop: Option<CropRect>,
    pub options: TransformOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let p = &config.pipeline;
        Self {
            process_count: p.process_count,
            frame_rate: p.frame_rate,
            quality: p.quality,
            overlap_threshold: p.overlap_threshold,
            poll_interval: p.poll_interval(),
            event_poll: p.event_poll(),
            job_timeout: p.job_timeout(),
            missing_frames: p.missing_frames,
            crf: p.crf,
            kind: config.mosaic.kind,
            scale: config.mosaic.scale.clone(),
            crop: None,
            options: config.mosaic.transform_options(),
        }
    }
}

/// A frame without transformed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameFailure {
    pub index: u32,
    pub reason: String,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The encoded video.
    pub output: PathBuf,
    /// Number of extracted frames.
    pub frame_total: u32,
    /// Frames transformed successfully.
    pub transformed: u32,
    /// Frames that failed, were degenerate or stalled.
    pub failures: Vec<FrameFailure>,
    /// Whether an audio track was muxed in.
    pub audio: bool,
}

/// Video-to-mosaic conversion pipeline.
///
/// One run at a time per cache root. The cache is emptied on entry and on
/// successful exit; a run aborted by an error leaves it populated.
pub struct Pipeline {
    settings: PipelineSettings,
    cache: CacheSet,
    backend: Arc<dyn MediaBackend>,
    transform: Arc<dyn FrameTransform>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        cache: CacheSet,
        backend: Arc<dyn MediaBackend>,
        transform: Arc<dyn FrameTransform>,
    ) -> Self {
        Self {
            settings,
            cache,
            backend,
            transform,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &CacheSet {
        &self.cache
    }

    /// Convert `input` into a mosaic video at `output`.
    ///
    /// Per-frame failures are tolerated and listed in the report. The run
    /// fails on a missing input, when extraction yields no frame, when no
    /// frame could be transformed, or when the final encode exits non-zero.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        sink: &mut dyn ProgressSink,
    ) -> Result<RunReport> {
        let mut run = Run::new(self, sink)?;
        run.execute(input, output)
    }
}

/// Mutable state of one run, owned by the scheduler thread.
struct Run<'a> {
    pipeline: &'a Pipeline,
    agg: Aggregator<'a>,
    pool: TransformPool,
    format: FrameFormat,
    phase: Phase,
    handles: BTreeMap<u32, JobHandle>,
    outcomes: BTreeMap<u32, JobOutcome>,
    last_activity: Instant,
}

impl<'a> Run<'a> {
    fn new(pipeline: &'a Pipeline, sink: &'a mut dyn ProgressSink) -> Result<Self> {
        let settings = &pipeline.settings;
        // Reject a bad scale before any work starts.
        settings.scale.tile_step()?;

        Ok(Self {
            pipeline,
            agg: Aggregator::new(sink),
            pool: TransformPool::new(settings.process_count, Arc::clone(&pipeline.transform))?,
            format: FrameFormat::from_quality(settings.quality),
            phase: Phase::Init,
            handles: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            last_activity: Instant::now(),
        })
    }

    fn settings(&self) -> &'a PipelineSettings {
        &self.pipeline.settings
    }

    fn cache(&self) -> &'a CacheSet {
        &self.pipeline.cache
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!("Pipeline phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn execute(&mut self, input: &Path, output: &Path) -> Result<RunReport> {
        let settings = self.settings();
        let cache = self.cache();
        let backend = Arc::clone(&self.pipeline.backend);

        // Init
        if !input.is_file() {
            return Err(mosaicforge_av::Error::file_not_found(input).into());
        }
        cache.ensure_dirs()?;
        cache.cleanup();

        let expected = match backend.probe_duration(input) {
            Ok(duration) => expected_frame_count(duration, settings.frame_rate),
            Err(e) => {
                tracing::warn!("Cannot probe duration of {:?}, frame total unknown: {}", input, e);
                0
            }
        };
        tracing::info!(
            "Converting {:?}: ~{} frames at {} fps, {} workers",
            input,
            expected,
            settings.frame_rate,
            self.pool.size()
        );
        self.agg.frame_count_known(expected);

        let mut extraction = ExtractionCoordinator::launch(
            Arc::clone(&backend),
            input.to_path_buf(),
            settings.frame_rate,
            cache.clone(),
            self.format,
        )?;
        let raw_dir = cache.raw_dir(self.format);
        let watcher = RawCacheWatcher::new(raw_dir);

        self.enter(Phase::OverlappedExtractAndTransform);
        self.overlap(&mut extraction, &watcher, expected);

        self.enter(Phase::DrainOverlap);
        let submitted: Vec<u32> = self.handles.keys().copied().collect();
        for index in submitted {
            self.wait_for(index);
        }
        self.wait_extraction(&mut extraction);
        let extracted = list_frames(raw_dir)?;
        check_frames(extraction.wait_frames(), extracted.len())?;
        self.agg.extraction_progress(EXTRACTION_DONE);

        self.enter(Phase::RemainderTransform);
        for (index, path) in &extracted {
            if !self.handles.contains_key(index) {
                self.submit(*index, path);
            }
        }
        let frame_total = extracted.len() as u32;
        if frame_total != expected {
            tracing::debug!("Frame total corrected from {} to {}", expected, frame_total);
        }
        self.agg.frame_count_known(frame_total);

        self.enter(Phase::WaitPoolDrain);
        self.drain_pool();
        let backfilled = self.agg.backfill(frame_total);
        if backfilled > 0 {
            tracing::debug!("Backfilled {} frame completions", backfilled);
        }
        self.agg.extraction_progress(TRANSFORM_DONE);

        self.enter(Phase::Reassemble);
        let audio = match extraction.wait_audio() {
            Ok(report) if report.success() && cache.has_audio() => true,
            Ok(report) => {
                tracing::info!("No audio track ({:?}): {}", report.code, report.stderr);
                false
            }
            Err(e) => {
                tracing::warn!("Audio extraction failed, encoding without audio: {}", e);
                false
            }
        };
        let start_number = apply_policy(cache, &self.outcomes, settings.missing_frames)?;
        let encode = ReassembleSettings {
            frames_pattern: cache.processed_pattern(),
            audio: audio.then(|| cache.audio_path()),
            frame_rate: settings.frame_rate,
            crf: settings.crf,
            start_number,
        };
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = backend.reassemble(&encode, output)?;
        if encoded.success() {
            self.agg.extraction_progress(REASSEMBLY_DONE);
        }

        self.enter(Phase::Cleanup);
        cache.cleanup();
        check_reassembly(&encoded)?;
        self.agg.extraction_progress(RUN_DONE);

        self.enter(Phase::Done);
        let report = self.report(output, frame_total, audio);
        tracing::info!(
            "Wrote {:?}: {}/{} frames transformed",
            report.output,
            report.transformed,
            report.frame_total
        );
        Ok(report)
    }

    /// Submit frames while extraction is still running, until the threshold
    /// is reached or extraction finishes.
    fn overlap(
        &mut self,
        extraction: &mut ExtractionCoordinator,
        watcher: &RawCacheWatcher,
        expected: u32,
    ) {
        let settings = self.settings();
        let raw_dir = self.cache().raw_dir(self.format);
        let threshold = (expected as f64 * settings.overlap_threshold).ceil() as usize;
        let completion = extraction.completion().clone();
        let pool_events = self.pool.events().clone();
        let mut schedule = RelistSchedule::new(settings.poll_interval, watcher.is_active());
        let mut last_submitted = 0;

        loop {
            let frames = list_frames(raw_dir).unwrap_or_default();
            schedule.listed();
            let count = frames.len();
            self.agg.extracted(count, expected);

            let finished = extraction.frames_done();
            // The newest frame may still be written to.
            let ready = if finished {
                &frames[..]
            } else {
                &frames[..count.saturating_sub(1)]
            };
            for (index, path) in ready {
                if *index > last_submitted {
                    self.submit(*index, path);
                    last_submitted = *index;
                }
            }

            if finished || (expected > 0 && count >= threshold) {
                tracing::debug!(
                    "Overlap ends with {} of ~{} frames extracted ({} submitted)",
                    count,
                    expected,
                    self.handles.len()
                );
                return;
            }

            // Serve pool events until the next listing is due or extraction ends.
            loop {
                let remaining = schedule.remaining();
                if remaining.is_zero() {
                    break;
                }
                select! {
                    recv(watcher.events()) -> _ => {
                        watcher.drain();
                        schedule.changed();
                    }
                    recv(completion) -> msg => {
                        extraction.record(extraction_message(msg));
                        break;
                    }
                    recv(pool_events) -> event => {
                        if let Ok(event) = event {
                            self.handle_event(event);
                        }
                    }
                    default(remaining) => {}
                }
            }
        }
    }

    /// Block until frame extraction has reported, forwarding pool events.
    fn wait_extraction(&mut self, extraction: &mut ExtractionCoordinator) {
        let completion = extraction.completion().clone();
        let pool_events = self.pool.events().clone();
        let poll = self.settings().poll_interval;

        while !extraction.frames_done() {
            select! {
                recv(completion) -> msg => extraction.record(extraction_message(msg)),
                recv(pool_events) -> event => {
                    if let Ok(event) = event {
                        self.handle_event(event);
                    }
                }
                default(poll) => {}
            }
        }
    }

    fn submit(&mut self, index: u32, raw: &Path) {
        let settings = self.settings();
        let job = TransformJob::new(
            raw,
            self.cache().staging_path(index),
            settings.kind,
            settings.scale.clone(),
        )
        .with_crop(settings.crop)
        .with_options(settings.options.clone());

        let handle = self
            .pool
            .submit(index, job, self.cache().processed_path(index));
        self.handles.insert(index, handle);
        self.last_activity = Instant::now();
    }

    fn handle_event(&mut self, event: PoolEvent) {
        self.last_activity = Instant::now();
        match event {
            PoolEvent::SubProgress { percent, .. } => self.agg.sub_progress(percent),
            PoolEvent::Done { index, outcome } => self.record(index, outcome),
        }
    }

    /// Forward every queued pool event without blocking.
    fn pump_events(&mut self) {
        while let Ok(event) = self.pool.events().try_recv() {
            self.handle_event(event);
        }
    }

    fn record(&mut self, index: u32, outcome: JobOutcome) {
        if self.outcomes.contains_key(&index) {
            return;
        }
        if let Some(reason) = outcome.failure_reason() {
            let err = Error::WorkerFailure { index, reason };
            match outcome {
                JobOutcome::Stalled => tracing::error!("{}", err),
                _ => tracing::warn!("{}", err),
            }
        }
        self.agg
            .frame_done(index, outcome.output().map(Path::to_path_buf));
        self.outcomes.insert(index, outcome);
    }

    fn idle(&self) -> bool {
        self.last_activity.elapsed() >= self.settings().job_timeout
    }

    /// Block on one job, giving up once the pool has been idle too long.
    fn wait_for(&mut self, index: u32) {
        let poll = self.settings().event_poll;
        loop {
            if self.outcomes.contains_key(&index) {
                return;
            }
            let ready = match self.handles.get_mut(&index) {
                Some(handle) => handle.wait_timeout(poll).cloned(),
                None => return,
            };
            if let Some(outcome) = ready {
                self.last_activity = Instant::now();
                self.record(index, outcome);
                return;
            }
            self.pump_events();
            if self.idle() {
                self.stall(index);
                return;
            }
        }
    }

    /// Wait for every outstanding job.
    fn drain_pool(&mut self) {
        let poll = self.settings().event_poll;
        loop {
            if let Ok(event) = self.pool.events().recv_timeout(poll) {
                self.handle_event(event);
                self.pump_events();
            }

            let mut finished = Vec::new();
            for (index, handle) in self.handles.iter_mut() {
                if self.outcomes.contains_key(index) {
                    continue;
                }
                if let Some(outcome) = handle.poll() {
                    finished.push((*index, outcome.clone()));
                }
            }
            for (index, outcome) in finished {
                self.record(index, outcome);
            }

            let pending: Vec<u32> = self
                .handles
                .keys()
                .filter(|index| !self.outcomes.contains_key(*index))
                .copied()
                .collect();
            if pending.is_empty() {
                // Sub-progress queued ahead of the last results.
                self.pump_events();
                return;
            }
            if self.idle() {
                for index in pending {
                    self.stall(index);
                }
                self.pump_events();
                return;
            }
        }
    }

    fn stall(&mut self, index: u32) {
        let outcome = match self.handles.get_mut(&index) {
            Some(handle) => handle.mark_stalled().clone(),
            None => JobOutcome::Stalled,
        };
        self.record(index, outcome);
    }

    fn report(&self, output: &Path, frame_total: u32, audio: bool) -> RunReport {
        let failures: Vec<FrameFailure> = self
            .outcomes
            .iter()
            .filter_map(|(index, outcome)| {
                outcome.failure_reason().map(|reason| FrameFailure {
                    index: *index,
                    reason,
                })
            })
            .collect();
        RunReport {
            output: output.to_path_buf(),
            frame_total,
            transformed: self.outcomes.values().filter(|o| o.is_success()).count() as u32,
            failures,
            audio,
        }
    }
}

fn extraction_message(
    msg: std::result::Result<ExtractionResult, crossbeam_channel::RecvError>,
) -> ExtractionResult {
    msg.unwrap_or_else(|_| Err("frame extraction thread panicked".to_string()))
}

fn check_reassembly(report: &ExitReport) -> Result<()> {
    if report.success() {
        return Ok(());
    }
    let message = match report.code {
        Some(code) => format!("reassembly exit code {code}: {}", report.stderr),
        None => format!("reassembly terminated by signal: {}", report.stderr),
    };
    tracing::error!("{}", message);
    Err(Error::external("ffmpeg", message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let mut config = Config::default();
        config.pipeline.process_count = 5;
        config.pipeline.quality = true;
        config.pipeline.missing_frames = MissingFramePolicy::Skip;

        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.process_count, 5);
        assert!(settings.quality);
        assert_eq!(settings.missing_frames, MissingFramePolicy::Skip);
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
        assert_eq!(settings.overlap_threshold, 0.95);
    }

    #[test]
    fn test_reassembly_exit_is_surfaced() {
        assert!(check_reassembly(&ExitReport::ok()).is_ok());
        let err = check_reassembly(&ExitReport::failed(1, "bad")).unwrap_err();
        assert!(matches!(err, Error::ExternalProcess { .. }));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::WaitPoolDrain.to_string(), "wait pool drain");
    }
}
