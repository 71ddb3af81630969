//! Colour difference metrics used to pick the nearest palette tile.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An sRGB colour.
pub type Rgb = [u8; 3];

/// Colour difference function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMetric {
    /// Sum of absolute channel differences.
    #[default]
    Absolute,
    /// Straight-line distance in RGB space.
    Euclidean,
    /// Euclidean distance with luma-style channel weights (3, 4, 2).
    WeightedEuclidean,
    /// "Redmean" low-cost perceptual approximation.
    Redmean,
    /// CIE76 ΔE in L*a*b* space.
    Cie76,
}

impl ColorMetric {
    /// Distance between two colours. Smaller is closer; only the ordering is meaningful.
    pub fn distance(&self, a: Rgb, b: Rgb) -> f64 {
        let dr = a[0] as f64 - b[0] as f64;
        let dg = a[1] as f64 - b[1] as f64;
        let db = a[2] as f64 - b[2] as f64;

        match self {
            ColorMetric::Absolute => dr.abs() + dg.abs() + db.abs(),
            ColorMetric::Euclidean => (dr * dr + dg * dg + db * db).sqrt(),
            ColorMetric::WeightedEuclidean => {
                (3.0 * dr * dr + 4.0 * dg * dg + 2.0 * db * db).sqrt()
            }
            ColorMetric::Redmean => {
                let rmean = (a[0] as f64 + b[0] as f64) / 2.0;
                ((2.0 + rmean / 256.0) * dr * dr
                    + 4.0 * dg * dg
                    + (2.0 + (255.0 - rmean) / 256.0) * db * db)
                    .sqrt()
            }
            ColorMetric::Cie76 => {
                let la = to_lab(a);
                let lb = to_lab(b);
                ((la[0] - lb[0]).powi(2) + (la[1] - lb[1]).powi(2) + (la[2] - lb[2]).powi(2))
                    .sqrt()
            }
        }
    }

    /// Get the metric name as used in config files.
    pub fn name(&self) -> &'static str {
        match self {
            ColorMetric::Absolute => "absolute",
            ColorMetric::Euclidean => "euclidean",
            ColorMetric::WeightedEuclidean => "weighted-euclidean",
            ColorMetric::Redmean => "redmean",
            ColorMetric::Cie76 => "cie76",
        }
    }
}

impl FromStr for ColorMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "absolute" | "absolute-difference" => Ok(ColorMetric::Absolute),
            "euclidean" | "euclidean-difference" => Ok(ColorMetric::Euclidean),
            "weighted-euclidean" => Ok(ColorMetric::WeightedEuclidean),
            "redmean" | "redmean-difference" => Ok(ColorMetric::Redmean),
            "cie76" | "cie76-dele" => Ok(ColorMetric::Cie76),
            other => Err(format!("unknown color metric: {other}")),
        }
    }
}

fn to_lab(rgb: Rgb) -> [f64; 3] {
    fn linear(c: u8) -> f64 {
        let c = c as f64 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    fn f(t: f64) -> f64 {
        if t > 216.0 / 24389.0 {
            t.cbrt()
        } else {
            (24389.0 / 27.0 * t + 16.0) / 116.0
        }
    }

    let (r, g, b) = (linear(rgb[0]), linear(rgb[1]), linear(rgb[2]));
    // D65 reference white
    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.95047;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / 1.08883;

    let (fx, fy, fz) = (f(x), f(y), f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}
