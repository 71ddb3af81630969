//! Duration probing and frame-count estimation.

use crate::command::ToolCommand;
use crate::{Error, Result};
use std::path::Path;
use std::time::Duration;

/// Probe a container's duration in seconds with ffprobe.
///
/// # Errors
///
/// Returns [`Error::FileNotFound`] if `input` does not exist, a tool error if
/// ffprobe fails, or [`Error::ParseError`] if no duration is reported.
pub fn probe_duration(ffprobe: &Path, input: &Path, timeout: Duration) -> Result<f64> {
    if !input.exists() {
        return Err(Error::file_not_found(input));
    }

    let output = ToolCommand::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .path_arg(input)
        .timeout(timeout)
        .execute_checked()?;

    parse_duration(&output.stdout)
}

/// Parse ffprobe's bare `format=duration` output.
pub fn parse_duration(stdout: &str) -> Result<f64> {
    let text = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let seconds: f64 = text
        .parse()
        .map_err(|_| Error::parse_error("ffprobe", format!("bad duration {text:?}")))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::parse_error(
            "ffprobe",
            format!("duration out of range: {seconds}"),
        ));
    }
    Ok(seconds)
}

/// Approximate number of frames a decode at `frame_rate` will produce.
pub fn expected_frame_count(duration_secs: f64, frame_rate: u32) -> u32 {
    let frames = (duration_secs * frame_rate as f64).round();
    if frames <= 0.0 {
        0
    } else if frames >= u32::MAX as f64 {
        u32::MAX
    } else {
        frames as u32
    }
}
