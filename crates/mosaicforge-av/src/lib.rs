//! # mosaicforge-av
//!
//! ffmpeg plumbing for frame-by-frame video rebuilds.
//!
//! This crate provides functionality for:
//! - Locating ffmpeg/ffprobe and reporting their versions
//! - Running external tools with a timeout and captured output
//! - Probing a video's duration to estimate its frame count
//! - Dumping frames and audio into a staging cache
//! - Re-encoding a transformed image sequence into a video
//! - Managing the staging cache lifecycle
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use mosaicforge_av::{actions, CacheSet, FrameFormat, ToolPaths};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let tools = ToolPaths::locate(None, None)?;
//! let cache = CacheSet::new("/tmp/mosaicforge-cache");
//! cache.ensure_dirs()?;
//! let out = actions::extract_frames(
//!     &tools.ffmpeg,
//!     Path::new("in.mp4"),
//!     12,
//!     &cache,
//!     FrameFormat::Jpeg,
//!     Duration::from_secs(600),
//! )?;
//! println!("ffmpeg exited with {}", out.status);
//! # Ok::<(), mosaicforge_av::Error>(())
//! ```

pub mod actions;
pub mod cache;
pub mod command;
mod error;
pub mod probe;
pub mod tools;

// Re-exports
pub use cache::{count_files, frame_index, list_frames, CacheSet, FrameFormat};
pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use probe::{expected_frame_count, probe_duration};
pub use tools::{ToolPaths, ToolStatus};
