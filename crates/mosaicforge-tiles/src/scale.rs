//! Scale normalization: user-facing multipliers to integer tile steps.
//!
//! A tile step is the edge length (in source pixels) of the block that
//! collapses into a single output tile. At a multiplier of `1.0` every
//! 16×16 source block becomes one 16×16 tile, so the output keeps the
//! source resolution; `2.0` doubles it, `0.5` halves it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pixel edge length of one rendered palette tile.
pub const TILE_RESOLUTION: u32 = 16;

/// Reference unit used to turn a multiplier into a tile step.
pub const REFERENCE_UNIT: f64 = TILE_RESOLUTION as f64;

/// A scale specifier as given by the user.
///
/// Accepts plain numbers (`0.5`, `2`) as well as strings in decimal
/// (`"1.5"`), percentage (`"50%"`) or multiplier (`"2x"`, `"×2"`, `"*2"`)
/// notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleSpec {
    /// A numeric multiplier.
    Multiplier(f64),
    /// A textual specifier, parsed on use.
    Text(String),
}

impl ScaleSpec {
    /// Resolve the specifier to a numeric multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidScale`] if the text cannot be parsed or the
    /// multiplier is not strictly positive.
    pub fn multiplier(&self) -> Result<f64> {
        let mult = match self {
            ScaleSpec::Multiplier(m) => *m,
            ScaleSpec::Text(text) => parse_multiplier(text)?,
        };

        if !mult.is_finite() || mult <= 0.0 {
            return Err(Error::invalid_scale(format!(
                "scale must be > 0, got {mult}"
            )));
        }

        Ok(mult)
    }

    /// Compute the tile step for this specifier.
    pub fn tile_step(&self) -> Result<u32> {
        tile_step(self.multiplier()?)
    }
}

impl Default for ScaleSpec {
    fn default() -> Self {
        ScaleSpec::Multiplier(1.0)
    }
}

impl From<f64> for ScaleSpec {
    fn from(value: f64) -> Self {
        ScaleSpec::Multiplier(value)
    }
}

impl FromStr for ScaleSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let spec = ScaleSpec::Text(s.to_string());
        // Validate eagerly so CLI parsing reports bad values up front.
        spec.multiplier()?;
        Ok(spec)
    }
}

impl fmt::Display for ScaleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleSpec::Multiplier(m) => write!(f, "{m}"),
            ScaleSpec::Text(t) => f.write_str(t),
        }
    }
}

/// Map a multiplier to a tile step: `round(16 / multiplier)`, at least 1.
///
/// Halfway values round to even.
///
/// # Example
///
/// ```
/// use mosaicforge_tiles::tile_step;
///
/// assert_eq!(tile_step(1.0).unwrap(), 16);
/// assert_eq!(tile_step(0.5).unwrap(), 32);
/// assert_eq!(tile_step(2.0).unwrap(), 8);
/// ```
pub fn tile_step(multiplier: f64) -> Result<u32> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(Error::invalid_scale(format!(
            "scale must be > 0, got {multiplier}"
        )));
    }

    let tile = (REFERENCE_UNIT / multiplier).round_ties_even();
    if tile < 1.0 {
        return Ok(1);
    }
    if tile > u32::MAX as f64 {
        return Err(Error::invalid_scale(format!(
            "scale {multiplier} is too small"
        )));
    }
    Ok(tile as u32)
}

fn parse_multiplier(text: &str) -> Result<f64> {
    let cleaned: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '×' | '*' | 'x'))
        .collect();
    let cleaned = cleaned.trim();

    let parsed = match cleaned.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().map(|v| v / 100.0),
        None => cleaned.parse::<f64>(),
    };

    parsed.map_err(|_| Error::invalid_scale(format!("cannot parse scale {text:?}")))
}

/// Round `value` up to the nearest multiple of `step`.
pub fn round_up_to_multiple(value: u32, step: u32) -> u32 {
    if step == 0 || value % step == 0 {
        value
    } else {
        value + (step - value % step)
    }
}
