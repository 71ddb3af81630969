//! Reassembly of transformed frames into the output video.

use crate::command::{ToolCommand, ToolOutput};
use crate::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for the final encode.
#[derive(Debug, Clone)]
pub struct ReassembleSettings {
    /// `%d` image-sequence pattern of the transformed frames.
    pub frames_pattern: PathBuf,
    /// Extracted audio track, if any.
    pub audio: Option<PathBuf>,
    /// Output frame rate.
    pub frame_rate: u32,
    /// x264 constant rate factor.
    pub crf: u8,
    /// First index in the image sequence.
    pub start_number: u32,
}

impl Default for ReassembleSettings {
    fn default() -> Self {
        Self {
            frames_pattern: PathBuf::from("%d.png"),
            audio: None,
            frame_rate: 12,
            crf: 20,
            start_number: 1,
        }
    }
}

/// Build the reassembly command.
pub fn reassemble_command(ffmpeg: &Path, settings: &ReassembleSettings, output: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg);
    cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
        .args([
            "-framerate".to_string(),
            settings.frame_rate.to_string(),
            "-start_number".to_string(),
            settings.start_number.to_string(),
            "-i".to_string(),
        ])
        .path_arg(&settings.frames_pattern);

    if let Some(audio) = &settings.audio {
        cmd.arg("-i")
            .path_arg(audio)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-shortest"]);
    }

    cmd.args([
        "-crf".to_string(),
        settings.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ])
    .path_arg(output);
    cmd
}

/// Encode the transformed frame sequence (plus optional audio) into `output`.
///
/// Returns the raw output; callers decide what a non-zero exit means.
pub fn reassemble(
    ffmpeg: &Path,
    settings: &ReassembleSettings,
    output: &Path,
    timeout: Duration,
) -> Result<ToolOutput> {
    #[cfg(feature = "tracing")]
    tracing::info!(
        "Reassembling {:?} at {} fps into {:?} (audio: {})",
        settings.frames_pattern,
        settings.frame_rate,
        output,
        settings.audio.is_some()
    );

    reassemble_command(ffmpeg, settings, output)
        .timeout(timeout)
        .execute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_audio() {
        let settings = ReassembleSettings {
            frames_pattern: PathBuf::from("/c/processed/%d.png"),
            frame_rate: 24,
            ..Default::default()
        };
        let cmd = reassemble_command(Path::new("ffmpeg"), &settings, Path::new("out.mp4"));
        let args = cmd.get_args();
        assert!(args.windows(2).any(|w| w == ["-framerate", "24"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "20"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(!args.iter().any(|a| a == "-map"));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_with_audio() {
        let settings = ReassembleSettings {
            audio: Some(PathBuf::from("/c/audio/audio.m4a")),
            ..Default::default()
        };
        let cmd = reassemble_command(Path::new("ffmpeg"), &settings, Path::new("out.mp4"));
        let args = cmd.get_args();
        let inputs: Vec<&String> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| &w[1])
            .collect();
        assert_eq!(inputs, vec!["%d.png", "/c/audio/audio.m4a"]);
        assert!(args.windows(2).any(|w| w == ["-map", "1:a:0"]));
    }
}
