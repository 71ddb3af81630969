//! The [`MediaBackend`] seam between the scheduler and the external
//! encoder/decoder.

use crate::Result;
use mosaicforge_av::actions::{self, ReassembleSettings};
use mosaicforge_av::{CacheSet, FrameFormat, ToolOutput, ToolPaths};
use std::path::Path;
use std::time::Duration;

/// Exit status of an external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, `None` if killed by a signal.
    pub code: Option<i32>,
    /// Tail of the process's stderr.
    pub stderr: String,
}

impl ExitReport {
    /// A successful exit.
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
        }
    }

    /// A failed exit with `code`.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ToolOutput> for ExitReport {
    fn from(output: ToolOutput) -> Self {
        let lines: Vec<&str> = output.stderr.trim().lines().collect();
        Self {
            code: output.code(),
            stderr: lines[lines.len().saturating_sub(5)..].join("\n"),
        }
    }
}

/// External media operations used by a pipeline run.
///
/// Implementations must be callable from several threads at once: frame and
/// audio extraction run concurrently.
pub trait MediaBackend: Send + Sync {
    /// Duration of `input` in seconds.
    fn probe_duration(&self, input: &Path) -> Result<f64>;

    /// Dump frames of `input` at `frame_rate` into the raw cache for `format`.
    fn extract_frames(
        &self,
        input: &Path,
        frame_rate: u32,
        cache: &CacheSet,
        format: FrameFormat,
    ) -> Result<ExitReport>;

    /// Extract the audio track of `input` into the audio cache.
    fn extract_audio(&self, input: &Path, cache: &CacheSet) -> Result<ExitReport>;

    /// Encode the transformed frame sequence into `output`.
    fn reassemble(&self, settings: &ReassembleSettings, output: &Path) -> Result<ExitReport>;
}

/// [`MediaBackend`] backed by the ffmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    tools: ToolPaths,
    probe_timeout: Duration,
    extract_timeout: Duration,
    encode_timeout: Duration,
}

impl FfmpegBackend {
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            tools,
            probe_timeout: Duration::from_secs(60),
            extract_timeout: Duration::from_secs(3600),
            encode_timeout: Duration::from_secs(3600),
        }
    }

    /// Set the extraction and encode timeouts.
    pub fn with_timeouts(mut self, extract: Duration, encode: Duration) -> Self {
        self.extract_timeout = extract;
        self.encode_timeout = encode;
        self
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }
}

impl MediaBackend for FfmpegBackend {
    fn probe_duration(&self, input: &Path) -> Result<f64> {
        Ok(mosaicforge_av::probe_duration(
            &self.tools.ffprobe,
            input,
            self.probe_timeout,
        )?)
    }

    fn extract_frames(
        &self,
        input: &Path,
        frame_rate: u32,
        cache: &CacheSet,
        format: FrameFormat,
    ) -> Result<ExitReport> {
        let output = actions::extract_frames(
            &self.tools.ffmpeg,
            input,
            frame_rate,
            cache,
            format,
            self.extract_timeout,
        )?;
        Ok(output.into())
    }

    fn extract_audio(&self, input: &Path, cache: &CacheSet) -> Result<ExitReport> {
        let output = actions::extract_audio(&self.tools.ffmpeg, input, cache, self.extract_timeout)?;
        Ok(output.into())
    }

    fn reassemble(&self, settings: &ReassembleSettings, output: &Path) -> Result<ExitReport> {
        let out = actions::reassemble(&self.tools.ffmpeg, settings, output, self.encode_timeout)?;
        Ok(out.into())
    }
}
