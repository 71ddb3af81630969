//! Crop regions for single-image transforms.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exclusive upper bound for any crop coordinate.
pub const MAX_CROP_COORDINATE: u32 = 1_000_000;

/// One edge of a crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropBound {
    /// An absolute pixel coordinate.
    At(u32),
    /// The image edge (width for x, height for y).
    Max,
}

impl CropBound {
    fn resolve(self, edge: u32) -> u32 {
        match self {
            CropBound::At(v) => v,
            CropBound::Max => edge,
        }
    }
}

impl FromStr for CropBound {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("max") {
            return Ok(CropBound::Max);
        }
        if s.len() > 8 {
            return Err(Error::degenerate(format!("crop coordinate too long: {s:?}")));
        }
        s.parse::<u32>()
            .map(CropBound::At)
            .map_err(|_| Error::degenerate(format!("invalid crop coordinate: {s:?}")))
    }
}

impl fmt::Display for CropBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CropBound::At(v) => write!(f, "{v}"),
            CropBound::Max => f.write_str("max"),
        }
    }
}

/// A crop rectangle `(x1, y1) .. (x2, y2)` in source pixels.
///
/// Parsed from `"x1,y1,x2,y2"`. Empty components default to `0,0,max,max`.
///
/// # Example
///
/// ```
/// use mosaicforge_tiles::CropRect;
///
/// let crop: CropRect = "10,20,max,".parse().unwrap();
/// assert_eq!(crop.resolve(100, 80).unwrap(), (10, 20, 100, 80));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x1: CropBound,
    pub y1: CropBound,
    pub x2: CropBound,
    pub y2: CropBound,
}

impl CropRect {
    /// Resolve against an image of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformDegenerate`] when a coordinate is out of
    /// range or the rectangle is empty.
    pub fn resolve(&self, width: u32, height: u32) -> Result<(u32, u32, u32, u32)> {
        let x1 = self.x1.resolve(width);
        let y1 = self.y1.resolve(height);
        let x2 = self.x2.resolve(width);
        let y2 = self.y2.resolve(height);

        if [x1, y1, x2, y2].iter().any(|&v| v >= MAX_CROP_COORDINATE) {
            return Err(Error::degenerate(format!(
                "crop {self} exceeds {MAX_CROP_COORDINATE}"
            )));
        }
        if x2 <= x1 || y2 <= y1 {
            return Err(Error::degenerate(format!("crop {self} is empty")));
        }

        Ok((x1, y1, x2, y2))
    }
}

impl FromStr for CropRect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::degenerate(format!(
                "crop must be \"x1,y1,x2,y2\", got {s:?}"
            )));
        }

        let or = |part: &str, default: &'static str| -> Result<CropBound> {
            if part.is_empty() {
                default.parse()
            } else {
                part.parse()
            }
        };

        Ok(CropRect {
            x1: or(parts[0], "0")?,
            y1: or(parts[1], "0")?,
            x2: or(parts[2], "max")?,
            y2: or(parts[3], "max")?,
        })
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}
