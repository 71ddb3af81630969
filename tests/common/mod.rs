//! Shared test harness for pipeline integration tests.
//!
//! [`FakeBackend`] stands in for ffmpeg: it writes numbered frame images into
//! the raw cache and "encodes" by writing a manifest of the frame sequence it
//! was handed. [`ScriptedTransform`] is a [`FrameTransform`] that can be told
//! to fail, panic, hang or dawdle on a given frame.

#![allow(dead_code)]

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use mosaicforge::pipeline::{
    ExitReport, MediaBackend, Pipeline, PipelineSettings, ProgressEvent, RunReport,
};
use mosaicforge_av::actions::ReassembleSettings;
use mosaicforge_av::{frame_index, CacheSet, FrameFormat};
use mosaicforge_tiles::{
    FrameTransform, TransformJob, TransformOutcome, TransformProgress, TransformSink,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Scripted stand-in for the ffmpeg tools.
pub struct FakeBackend {
    /// Frames written by frame extraction.
    pub frames: u32,
    /// Duration reported by the probe, in seconds.
    pub duration: f64,
    /// Pause before each frame is written.
    pub frame_delay: Duration,
    /// Whether the source has an audio track.
    pub audio: bool,
    /// Exit code of the final encode.
    pub reassemble_code: i32,
    /// Settings the final encode was called with.
    pub encoded: Mutex<Option<ReassembleSettings>>,
}

impl FakeBackend {
    /// `frames` frames at 12 fps, probe agreeing with the frame count.
    pub fn new(frames: u32) -> Self {
        Self {
            frames,
            duration: frames as f64 / 12.0,
            frame_delay: Duration::ZERO,
            audio: false,
            reassemble_code: 0,
            encoded: Mutex::new(None),
        }
    }

    pub fn encoded(&self) -> Option<ReassembleSettings> {
        self.encoded.lock().unwrap().clone()
    }
}

impl MediaBackend for FakeBackend {
    fn probe_duration(&self, _input: &Path) -> mosaicforge::Result<f64> {
        Ok(self.duration)
    }

    fn extract_frames(
        &self,
        _input: &Path,
        _frame_rate: u32,
        cache: &CacheSet,
        format: FrameFormat,
    ) -> mosaicforge::Result<ExitReport> {
        let dir = cache.raw_dir(format);
        for i in 1..=self.frames {
            if !self.frame_delay.is_zero() {
                std::thread::sleep(self.frame_delay);
            }
            let path = dir.join(format!("frame{i:04}.{}", format.extension()));
            let shade = (i * 20 % 255) as u8;
            let saved = match format {
                FrameFormat::Png => {
                    RgbaImage::from_pixel(32, 32, Rgba([shade, 100, 50, 255])).save(&path)
                }
                FrameFormat::Jpeg => RgbImage::from_pixel(32, 32, Rgb([shade, 100, 50])).save(&path),
            };
            saved.map_err(|e| std::io::Error::other(e.to_string()))?;
        }
        if self.frames == 0 {
            return Ok(ExitReport::failed(1, "Output file is empty, nothing was encoded"));
        }
        Ok(ExitReport::ok())
    }

    fn extract_audio(&self, _input: &Path, cache: &CacheSet) -> mosaicforge::Result<ExitReport> {
        if !self.audio {
            return Ok(ExitReport::failed(
                1,
                "Output file #0 does not contain any stream",
            ));
        }
        fs::write(cache.audio_path(), b"aac")?;
        Ok(ExitReport::ok())
    }

    fn reassemble(
        &self,
        settings: &ReassembleSettings,
        output: &Path,
    ) -> mosaicforge::Result<ExitReport> {
        *self.encoded.lock().unwrap() = Some(settings.clone());

        let dir = settings
            .frames_pattern
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut manifest = Vec::new();
        let mut index = settings.start_number;
        while dir.join(format!("{index}.png")).is_file() {
            manifest.push(format!("{index}.png"));
            index += 1;
        }
        fs::write(output, manifest.join("\n"))?;

        if self.reassemble_code != 0 {
            return Ok(ExitReport::failed(self.reassemble_code, "Invalid argument"));
        }
        Ok(ExitReport::ok())
    }
}

/// A transform that writes a marker file, or misbehaves on chosen frames.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransform {
    pub fail_on: Option<u32>,
    pub panic_on: Option<u32>,
    pub hang_on: Option<u32>,
    /// Sleep this long on the given frame, then finish normally.
    pub slow_on: Option<(u32, Duration)>,
}

impl FrameTransform for ScriptedTransform {
    fn transform(
        &self,
        job: &TransformJob,
        sink: &mut dyn TransformSink,
    ) -> mosaicforge_tiles::Result<TransformOutcome> {
        let index = frame_index(job.source()).unwrap_or(0);

        if self.hang_on == Some(index) {
            loop {
                std::thread::park();
            }
        }
        if let Some((slow, delay)) = self.slow_on {
            if slow == index {
                std::thread::sleep(delay);
            }
        }
        if self.panic_on == Some(index) {
            panic!("transform blew up on frame {index}");
        }
        if self.fail_on == Some(index) {
            return Err(std::io::Error::other(format!("cannot decode frame {index}")).into());
        }

        sink.report(TransformProgress::TotalKnown(60));
        for x in 0..60 {
            sink.report(TransformProgress::Progress(x));
        }
        fs::write(job.destination(), format!("frame {index}"))?;
        sink.report(TransformProgress::OutputWritten(job.destination().to_path_buf()));
        sink.report(TransformProgress::Complete);
        Ok(TransformOutcome::Written(job.destination().to_path_buf()))
    }
}

/// Settings with short poll intervals for tests.
pub fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        process_count: 2,
        poll_interval: Duration::from_millis(10),
        event_poll: Duration::from_millis(20),
        job_timeout: Duration::from_secs(10),
        ..Default::default()
    }
}

/// Everything a test needs to inspect after a run.
pub struct RunResult {
    pub result: mosaicforge::Result<RunReport>,
    pub events: Vec<ProgressEvent>,
    pub output: PathBuf,
    pub cache: CacheSet,
    pub backend: Arc<FakeBackend>,
    _tmp: TempDir,
}

impl RunResult {
    pub fn frame_done(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::FrameDone(_)))
            .count()
    }

    pub fn frame_counts(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::FrameCountKnown(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    pub fn sub_progress(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::SingleFrameSubProgress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn extraction_progress(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::ExtractionProgress(f) => Some(*f),
                _ => None,
            })
            .collect()
    }

    pub fn manifest(&self) -> Vec<String> {
        fs::read_to_string(&self.output)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Files left in any staging directory.
    pub fn cached_files(&self) -> usize {
        [
            self.cache.raw_dir(FrameFormat::Jpeg),
            self.cache.raw_dir(FrameFormat::Png),
            self.cache.processed_dir(),
            self.cache.audio_dir(),
        ]
        .iter()
        .map(|dir| mosaicforge_av::count_files(dir))
        .sum()
    }
}

/// Run a pipeline against a fresh temp directory.
pub fn run_pipeline(
    backend: FakeBackend,
    transform: Arc<dyn FrameTransform>,
    settings: PipelineSettings,
) -> RunResult {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input.mp4");
    fs::write(&input, b"not really a video").unwrap();
    let output = tmp.path().join("out").join("output.mp4");
    let cache = CacheSet::new(tmp.path().join("cache"));

    let backend = Arc::new(backend);
    let pipeline = Pipeline::new(
        settings,
        cache.clone(),
        Arc::clone(&backend) as Arc<dyn MediaBackend>,
        transform,
    );

    let mut events = Vec::new();
    let result = {
        let mut sink = |event: ProgressEvent| events.push(event);
        pipeline.run(&input, &output, &mut sink)
    };

    RunResult {
        result,
        events,
        output,
        cache,
        backend,
        _tmp: tmp,
    }
}
