//! Output path naming for the image and video commands.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Directory used when the requested output would overwrite the input.
pub const DEFAULT_OUTPUT_DIR: &str = "./mosaicforge_output";

/// What a command writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        }
    }

    /// Guess from a file extension.
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" | "gif" | "webp" | "tif" | "tiff" => {
                Some(MediaKind::Image)
            }
            "mp4" | "mkv" | "mov" | "avi" | "webm" | "m4v" | "flv" | "wmv" => {
                Some(MediaKind::Video)
            }
            _ => None,
        }
    }
}

/// Timestamp used in generated file names, e.g. `24_03_09-14_05_59`.
pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("%y_%m_%d-%H_%M_%S").to_string()
}

/// An output path plus a warning to show the user, if it was adjusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub path: PathBuf,
    pub warning: Option<String>,
}

impl ResolvedOutput {
    fn plain(path: PathBuf) -> Self {
        Self {
            path,
            warning: None,
        }
    }
}

fn auto_name(kind: MediaKind, stamp: &str) -> String {
    format!("output{stamp}.{}", kind.extension())
}

/// Work out where a single conversion writes.
///
/// - no output: `output<stamp>.<ext>` next to the input,
/// - an existing directory, a trailing separator or no extension: an
///   auto-named file inside it,
/// - a wrong extension: replaced, with a warning,
/// - the input itself: redirected to [`DEFAULT_OUTPUT_DIR`].
pub fn resolve_output(
    input: &Path,
    output: Option<&Path>,
    kind: MediaKind,
    stamp: &str,
) -> ResolvedOutput {
    let Some(output) = output else {
        let dir = input.parent().unwrap_or_else(|| Path::new(""));
        return ResolvedOutput::plain(dir.join(auto_name(kind, stamp)));
    };

    let raw = output.to_string_lossy();
    let trailing_sep = raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR);
    if output.is_dir() || trailing_sep || output.extension().is_none() {
        return ResolvedOutput::plain(output.join(auto_name(kind, stamp)));
    }

    let mut resolved = ResolvedOutput::plain(output.to_path_buf());
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    if ext.as_deref() != Some(kind.extension()) {
        resolved.path = output.with_extension(kind.extension());
        resolved.warning = Some(format!(
            "output extension changed to .{}: {}",
            kind.extension(),
            resolved.path.display()
        ));
    }

    if same_file(&resolved.path, input) {
        let name = resolved
            .path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(auto_name(kind, stamp)));
        resolved.path = Path::new(DEFAULT_OUTPUT_DIR).join(name);
        resolved.warning = Some(format!(
            "output would overwrite the input, writing {} instead",
            resolved.path.display()
        ));
    }

    resolved
}

/// Output path for one file of a directory batch.
pub fn batch_output(out_dir: &Path, input: &Path, kind: MediaKind) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    out_dir.join(format!("{stem}.{}", kind.extension()))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
