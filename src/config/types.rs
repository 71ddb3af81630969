use crate::pipeline::MissingFramePolicy;
use mosaicforge_tiles::{ColorMetric, FilterMode, ScaleSpec, Side, TransformKind, TransformOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub mosaic: MosaicConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Transform workers (clamped to 1..=16)
    #[serde(default = "default_process_count")]
    pub process_count: usize,

    /// Frames per second sampled from the source and written to the output
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Extract lossless PNG frames instead of JPEG
    #[serde(default)]
    pub quality: bool,

    /// Fraction of expected frames after which the overlap phase ends
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,

    /// Raw-cache recount interval when no filesystem event arrives
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait slice when draining worker events
    #[serde(default = "default_event_poll_ms")]
    pub event_poll_ms: u64,

    /// Idle time after which outstanding jobs count as stalled
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// What reassembly does with frames that failed to transform
    #[serde(default)]
    pub missing_frames: MissingFramePolicy,

    /// x264 constant rate factor for the output
    #[serde(default = "default_crf")]
    pub crf: u8,
}

fn default_process_count() -> usize {
    2
}

fn default_frame_rate() -> u32 {
    12
}

fn default_overlap_threshold() -> f64 {
    0.95
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_event_poll_ms() -> u64 {
    200
}

fn default_job_timeout_secs() -> u64 {
    300
}

fn default_crf() -> u8 {
    20
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            process_count: default_process_count(),
            frame_rate: default_frame_rate(),
            quality: false,
            overlap_threshold: default_overlap_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            event_poll_ms: default_event_poll_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            missing_frames: MissingFramePolicy::default(),
            crf: default_crf(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn event_poll(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Root of the staging directories
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("./.mosaicforge-cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Upper bound for frame and audio extraction
    #[serde(default = "default_tool_timeout_secs")]
    pub extract_timeout_secs: u64,

    /// Upper bound for the final encode
    #[serde(default = "default_tool_timeout_secs")]
    pub encode_timeout_secs: u64,
}

fn default_tool_timeout_secs() -> u64 {
    3600
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            extract_timeout_secs: default_tool_timeout_secs(),
            encode_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MosaicConfig {
    #[serde(default)]
    pub kind: TransformKind,

    /// Scale multiplier (`1.0`, `"50%"`, `"2x"`)
    #[serde(default)]
    pub scale: ScaleSpec,

    /// Palette face that is sampled
    #[serde(default)]
    pub side: Side,

    /// How `filter` is applied to the palette
    #[serde(default)]
    pub mode: FilterMode,

    /// Palette entry names for whitelist/blacklist mode
    #[serde(default)]
    pub filter: Vec<String>,

    /// File with one palette entry name per line
    #[serde(default)]
    pub filter_file: Option<PathBuf>,

    #[serde(default)]
    pub color_metric: ColorMetric,

    /// JSON palette replacing the built-in one
    #[serde(default)]
    pub palette_file: Option<PathBuf>,

    /// Lamp threshold
    #[serde(default = "default_brightness")]
    pub brightness: u8,

    #[serde(default)]
    pub dither: bool,
}

fn default_brightness() -> u8 {
    127
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            kind: TransformKind::default(),
            scale: ScaleSpec::default(),
            side: Side::default(),
            mode: FilterMode::default(),
            filter: Vec::new(),
            filter_file: None,
            color_metric: ColorMetric::default(),
            palette_file: None,
            brightness: default_brightness(),
            dither: false,
        }
    }
}

impl MosaicConfig {
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            side: self.side,
            metric: self.color_metric,
            brightness: self.brightness,
            dither: self.dither,
        }
    }
}
