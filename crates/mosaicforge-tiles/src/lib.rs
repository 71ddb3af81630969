//! Image-to-tile-mosaic transforms.
//!
//! This crate converts a single raster image into a mosaic of 16×16 tiles,
//! either by matching each cell to the nearest colour in a [`Palette`] or by
//! rendering it as a lit/unlit lamp.
//!
//! # Features
//!
//! - **Scale normalization**: multipliers, percentages and `2x` notation
//!   resolve to an integer tile step
//! - **Cropping** with `max` bounds and transparent padding
//! - **Colour metrics** for palette matching
//! - **Typed progress**: every transform reports through a [`TransformSink`]
//!
//! # Example
//!
//! ```no_run
//! use mosaicforge_tiles::{
//!     FrameTransform, MosaicTransform, NullSink, TransformJob, TransformKind,
//! };
//!
//! let job = TransformJob::new("in.png", "out.png", TransformKind::PaletteImage, 1.0.into());
//! let outcome = MosaicTransform::default().transform(&job, &mut NullSink)?;
//! println!("{outcome:?}");
//! # Ok::<(), mosaicforge_tiles::Error>(())
//! ```

pub mod crop;
pub mod error;
pub mod lamps;
pub mod metric;
pub mod mosaic;
pub mod palette;
pub mod progress;
pub mod raster;
pub mod scale;
pub mod transform;

pub use crop::{CropBound, CropRect};
pub use error::{Error, Result};
pub use metric::{ColorMetric, Rgb};
pub use mosaic::MosaicTransform;
pub use palette::{FilterMode, Palette, PaletteEntry, Side};
pub use progress::{NullSink, ProgressTracker, TransformProgress, TransformSink};
pub use scale::{round_up_to_multiple, tile_step, ScaleSpec, TILE_RESOLUTION};
pub use transform::{FrameTransform, TransformJob, TransformKind, TransformOptions, TransformOutcome};
