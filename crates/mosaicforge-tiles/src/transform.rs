//! Transform jobs and the [`FrameTransform`] seam.

use crate::crop::CropRect;
use crate::metric::ColorMetric;
use crate::palette::Side;
use crate::progress::TransformSink;
use crate::scale::ScaleSpec;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What a transform produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    /// Every pixel becomes the nearest palette tile.
    #[default]
    PaletteImage,
    /// Every pixel becomes a lit or unlit lamp tile.
    LampsImage,
}

impl TransformKind {
    /// Get the kind name as used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            TransformKind::PaletteImage => "palette-image",
            TransformKind::LampsImage => "lamps-image",
        }
    }

    /// Default output extension.
    pub fn extension(&self) -> &'static str {
        "png"
    }
}

impl FromStr for TransformKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "palette-image" | "palette" | "any-image" => Ok(TransformKind::PaletteImage),
            "lamps-image" | "lamps" => Ok(TransformKind::LampsImage),
            other => Err(format!("unknown transform kind: {other}")),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-job tuning shared by every frame of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Which palette face is sampled.
    pub side: Side,
    /// Colour difference used for palette matching.
    pub metric: ColorMetric,
    /// Lamp threshold (0-255); brighter pixels light the lamp.
    pub brightness: u8,
    /// Apply ordered dithering to the lamp threshold.
    pub dither: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            side: Side::Top,
            metric: ColorMetric::Absolute,
            brightness: 127,
            dither: false,
        }
    }
}

/// A single image transform request.
///
/// Immutable once handed to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: TransformKind,
    pub crop: Option<CropRect>,
    pub scale: ScaleSpec,
    pub options: TransformOptions,
}

impl TransformJob {
    /// Create a job with default options and no crop.
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        kind: TransformKind,
        scale: ScaleSpec,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
            crop: None,
            scale,
            options: TransformOptions::default(),
        }
    }

    /// Set the crop rectangle.
    pub fn with_crop(mut self, crop: Option<CropRect>) -> Self {
        self.crop = crop;
        self
    }

    /// Set the transform options.
    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// Source image path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Output image path.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Result of a transform that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// The output file was written.
    Written(PathBuf),
    /// Nothing could be produced (empty crop, zero-size raster, ...).
    Degenerate(String),
}

/// Converts one image and reports progress through a [`TransformSink`].
///
/// Implementations must follow the progress contract described in
/// [`crate::progress`].
pub trait FrameTransform: Send + Sync {
    fn transform(&self, job: &TransformJob, sink: &mut dyn TransformSink)
        -> Result<TransformOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_aliases() {
        assert_eq!(
            "any-image".parse::<TransformKind>().unwrap(),
            TransformKind::PaletteImage
        );
        assert_eq!(
            "Lamps".parse::<TransformKind>().unwrap(),
            TransformKind::LampsImage
        );
        assert!("schematic".parse::<TransformKind>().is_err());
    }

    #[test]
    fn test_job_builder() {
        let crop: CropRect = "0,0,8,8".parse().unwrap();
        let job = TransformJob::new("a.png", "b.png", TransformKind::LampsImage, 2.0.into())
            .with_crop(Some(crop));
        assert_eq!(job.source(), Path::new("a.png"));
        assert_eq!(job.destination(), Path::new("b.png"));
        assert_eq!(job.crop, Some(crop));
        assert_eq!(job.options, TransformOptions::default());
    }
}
