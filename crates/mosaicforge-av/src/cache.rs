//! Staging cache lifecycle.
//!
//! A [`CacheSet`] owns the four staging directories of one pipeline run:
//! lossy raw frames, lossless raw frames, transformed frames and audio. All
//! four live under a caller-chosen root, so runs against distinct roots do
//! not interfere. Two runs sharing one root will corrupt each other's frame
//! indices; callers must not do that.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Extracted audio file name inside the audio directory.
pub const AUDIO_FILE: &str = "audio.m4a";

/// Prefix of raw frame file names (`frame0001.jpg`).
pub const RAW_FRAME_PREFIX: &str = "frame";

/// Intermediate format of raw frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    /// Lossy JPEG.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl FrameFormat {
    /// Pick the format from the quality flag.
    pub fn from_quality(quality: bool) -> Self {
        if quality {
            FrameFormat::Png
        } else {
            FrameFormat::Jpeg
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpg",
            FrameFormat::Png => "png",
        }
    }
}

/// Staging directories for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSet {
    root: PathBuf,
    raw_jpeg: PathBuf,
    raw_png: PathBuf,
    processed: PathBuf,
    audio: PathBuf,
}

impl CacheSet {
    /// Describe a cache set rooted at `root`. Nothing is created yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            raw_jpeg: root.join("raw-jpg"),
            raw_png: root.join("raw-png"),
            processed: root.join("processed"),
            audio: root.join("audio"),
            root,
        }
    }

    /// Cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dirs(&self) -> [&Path; 4] {
        [&self.raw_jpeg, &self.raw_png, &self.processed, &self.audio]
    }

    /// Create every staging directory that does not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in self.dirs() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Cache(format!("cannot create {}: {e}", dir.display())))?;
        }
        Ok(())
    }

    /// Delete every file (not subdirectory) in the staging directories.
    ///
    /// Never fails: missing directories are skipped and per-file errors are
    /// logged. Returns the number of files removed.
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        for dir in self.dirs() {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Cannot list cache directory {:?}: {}", dir, _e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Failed to remove cached file {:?}: {}", path, _e);
                    }
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Removed {} cached files under {:?}", removed, self.root);

        removed
    }

    /// Directory raw frames of `format` are extracted into.
    pub fn raw_dir(&self, format: FrameFormat) -> &Path {
        match format {
            FrameFormat::Jpeg => &self.raw_jpeg,
            FrameFormat::Png => &self.raw_png,
        }
    }

    /// ffmpeg output pattern for raw frames.
    pub fn raw_pattern(&self, format: FrameFormat) -> PathBuf {
        self.raw_dir(format)
            .join(format!("{RAW_FRAME_PREFIX}%04d.{}", format.extension()))
    }

    /// Directory holding transformed frames.
    pub fn processed_dir(&self) -> &Path {
        &self.processed
    }

    /// Destination of the transformed frame with `index`.
    pub fn processed_path(&self, index: u32) -> PathBuf {
        self.processed.join(format!("{index}.png"))
    }

    /// Where a worker writes frame `index` before it is published to
    /// [`processed_path`](Self::processed_path). Not matched by the encoder
    /// pattern or by [`frame_index`].
    pub fn staging_path(&self, index: u32) -> PathBuf {
        self.processed.join(format!("{index}.part.png"))
    }

    /// ffmpeg input pattern for transformed frames.
    pub fn processed_pattern(&self) -> PathBuf {
        self.processed.join("%d.png")
    }

    /// Directory holding extracted audio.
    pub fn audio_dir(&self) -> &Path {
        &self.audio
    }

    /// Path of the extracted audio track.
    pub fn audio_path(&self) -> PathBuf {
        self.audio.join(AUDIO_FILE)
    }

    /// Whether a non-empty audio track has been extracted.
    pub fn has_audio(&self) -> bool {
        fs::metadata(self.audio_path())
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }
}

/// Numeric frame index encoded in a file name (`frame0042.jpg` -> 42, `7.png` -> 7).
pub fn frame_index(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.trim_start_matches(|c: char| !c.is_ascii_digit());
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Indexed frames in `dir`, sorted by index. Files without an index are ignored.
pub fn list_frames(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut frames: Vec<(u32, PathBuf)> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| frame_index(&p).map(|i| (i, p)))
        .collect();
    frames.sort_by_key(|(i, _)| *i);
    Ok(frames)
}

/// Number of regular files in `dir`; a missing directory counts as empty.
pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| entries.flatten().filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}
