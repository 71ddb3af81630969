//! Locating ffmpeg and ffprobe.

use crate::command::ToolCommand;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on a `-version` query.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved locations of the encoder/decoder tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl ToolPaths {
    /// Resolve both tools, preferring configured paths over `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] if either tool is missing.
    pub fn locate(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Result<Self> {
        Ok(Self {
            ffmpeg: resolve("ffmpeg", ffmpeg)?,
            ffprobe: resolve("ffprobe", ffprobe)?,
        })
    }

    /// Availability of both tools. Never fails.
    pub fn report(&self) -> [ToolStatus; 2] {
        [
            ToolStatus::query("ffmpeg", &self.ffmpeg),
            ToolStatus::query("ffprobe", &self.ffprobe),
        ]
    }
}

impl Default for ToolPaths {
    /// Bare names, resolved through `PATH` at spawn time.
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

fn resolve(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        _ => which::which(name).map_err(|_| Error::tool_not_found(name)),
    }
}

/// What `check-tools` reports for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    /// Executable found on disk or on `PATH`.
    pub path: Option<PathBuf>,
    /// First line of `-version`, if the tool ran.
    pub version: Option<String>,
}

impl ToolStatus {
    /// Locate `program` and ask it for its version.
    pub fn query(name: &'static str, program: &Path) -> Self {
        let path = which::which(program).ok();
        let version = path.as_ref().and_then(|path| {
            ToolCommand::new(path.clone())
                .arg("-version")
                .timeout(VERSION_TIMEOUT)
                .execute_checked()
                .ok()
                .and_then(|out| out.stdout.lines().next().map(str::to_string))
        });
        Self {
            name,
            path,
            version,
        }
    }

    pub fn available(&self) -> bool {
        self.version.is_some()
    }
}
