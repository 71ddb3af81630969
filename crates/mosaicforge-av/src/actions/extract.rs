//! Frame and audio extraction.

use crate::cache::{CacheSet, FrameFormat};
use crate::command::{ToolCommand, ToolOutput};
use crate::Result;
use std::path::Path;
use std::time::Duration;

/// Build the frame dump command: `input` at `frame_rate` fps into the raw cache.
pub fn extract_frames_command(
    ffmpeg: &Path,
    input: &Path,
    frame_rate: u32,
    cache: &CacheSet,
    format: FrameFormat,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .path_arg(input)
        .args(["-vf".to_string(), format!("fps={frame_rate}")]);

    if format == FrameFormat::Jpeg {
        cmd.args(["-q:v", "2"]);
    }

    cmd.path_arg(&cache.raw_pattern(format));
    cmd
}

/// Dump every frame of `input` into the raw-frame cache.
///
/// The returned output carries the exit status; a non-zero exit is not an
/// error at this level.
pub fn extract_frames(
    ffmpeg: &Path,
    input: &Path,
    frame_rate: u32,
    cache: &CacheSet,
    format: FrameFormat,
    timeout: Duration,
) -> Result<ToolOutput> {
    #[cfg(feature = "tracing")]
    tracing::info!("Extracting frames from {:?} at {} fps", input, frame_rate);

    extract_frames_command(ffmpeg, input, frame_rate, cache, format)
        .timeout(timeout)
        .execute()
}

/// Build the audio extraction command (AAC into the audio cache).
pub fn extract_audio_command(ffmpeg: &Path, input: &Path, cache: &CacheSet) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .path_arg(input)
        .args(["-vn", "-c:a", "aac"])
        .path_arg(&cache.audio_path());
    cmd
}

/// Extract the first audio track of `input`, if it has one.
///
/// Inputs without audio make ffmpeg exit non-zero; callers treat that as
/// "no audio".
pub fn extract_audio(
    ffmpeg: &Path,
    input: &Path,
    cache: &CacheSet,
    timeout: Duration,
) -> Result<ToolOutput> {
    #[cfg(feature = "tracing")]
    tracing::info!("Extracting audio from {:?}", input);

    extract_audio_command(ffmpeg, input, cache)
        .timeout(timeout)
        .execute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_extraction_args() {
        let cache = CacheSet::new("/c");
        let cmd = extract_frames_command(
            Path::new("ffmpeg"),
            Path::new("in.mp4"),
            12,
            &cache,
            FrameFormat::Jpeg,
        );
        let args = cmd.get_args();
        assert!(args.windows(2).any(|w| w == ["-vf", "fps=12"]));
        assert!(args.windows(2).any(|w| w == ["-q:v", "2"]));
        assert_eq!(args.last().unwrap(), "/c/raw-jpg/frame%04d.jpg");
    }

    #[test]
    fn test_png_extraction_is_lossless() {
        let cache = CacheSet::new("/c");
        let cmd = extract_frames_command(
            Path::new("ffmpeg"),
            Path::new("in.mp4"),
            24,
            &cache,
            FrameFormat::Png,
        );
        let args = cmd.get_args();
        assert!(!args.iter().any(|a| a == "-q:v"));
        assert_eq!(args.last().unwrap(), "/c/raw-png/frame%04d.png");
    }

    #[test]
    fn test_audio_args() {
        let cache = CacheSet::new("/c");
        let cmd = extract_audio_command(Path::new("ffmpeg"), Path::new("in.mp4"), &cache);
        let args = cmd.get_args();
        assert!(args.iter().any(|a| a == "-vn"));
        assert_eq!(args.last().unwrap(), "/c/audio/audio.m4a");
    }
}
