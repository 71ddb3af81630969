//! Tile palettes.
//!
//! A palette is a list of named tiles, each with a colour per face. The
//! mosaic transform samples one face (see [`Side`]) and maps every pixel to
//! the tile whose face colour is closest under a [`ColorMetric`].

use crate::metric::{ColorMetric, Rgb};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

/// Which face of a tile is sampled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Top,
    Bottom,
    North,
    South,
    East,
    West,
}

/// Face lookup order when an entry lacks the requested side.
const SIDE_FALLBACK: [Side; 6] = [
    Side::Top,
    Side::North,
    Side::South,
    Side::East,
    Side::West,
    Side::Bottom,
];

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(Side::Top),
            "bottom" => Ok(Side::Bottom),
            "north" => Ok(Side::North),
            "south" => Ok(Side::South),
            "east" => Ok(Side::East),
            "west" => Ok(Side::West),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// How the palette filter list is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Use every entry; the filter list is ignored.
    #[default]
    All,
    /// Keep only entries named in the filter list.
    Whitelist,
    /// Drop entries named in the filter list.
    Blacklist,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "whitelist" => Ok(FilterMode::Whitelist),
            "blacklist" => Ok(FilterMode::Blacklist),
            other => Err(format!("unknown filter mode: {other}")),
        }
    }
}

/// A single palette tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    /// Unique tile name.
    pub name: String,
    /// Colour of each available face.
    pub faces: BTreeMap<Side, Rgb>,
}

impl PaletteEntry {
    /// Colour of the requested face, falling back to the first available face.
    pub fn face(&self, side: Side) -> Option<Rgb> {
        self.faces
            .get(&side)
            .or_else(|| SIDE_FALLBACK.iter().find_map(|s| self.faces.get(s)))
            .copied()
    }
}

/// An ordered set of palette tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

/// Base colours of the built-in palette.
const BUILTIN: [(&str, Rgb); 16] = [
    ("white_tile", [207, 213, 214]),
    ("orange_tile", [224, 97, 1]),
    ("magenta_tile", [169, 48, 159]),
    ("light_blue_tile", [36, 137, 199]),
    ("yellow_tile", [241, 175, 21]),
    ("lime_tile", [94, 169, 24]),
    ("pink_tile", [214, 101, 143]),
    ("gray_tile", [55, 58, 62]),
    ("light_gray_tile", [125, 125, 115]),
    ("cyan_tile", [21, 119, 136]),
    ("purple_tile", [100, 32, 156]),
    ("blue_tile", [45, 47, 143]),
    ("brown_tile", [96, 60, 32]),
    ("green_tile", [73, 91, 36]),
    ("red_tile", [142, 33, 33]),
    ("black_tile", [8, 10, 15]),
];

fn shade(color: Rgb, factor: f64) -> Rgb {
    color.map(|c| (c as f64 * factor).round().clamp(0.0, 255.0) as u8)
}

impl Palette {
    /// Create a palette from explicit entries.
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    /// The built-in palette: sixteen solid tiles with directional face shading.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, base)| {
                let faces = BTreeMap::from([
                    (Side::Top, *base),
                    (Side::North, shade(*base, 0.8)),
                    (Side::South, shade(*base, 0.8)),
                    (Side::East, shade(*base, 0.6)),
                    (Side::West, shade(*base, 0.6)),
                    (Side::Bottom, shade(*base, 0.5)),
                ]);
                PaletteEntry {
                    name: name.to_string(),
                    faces,
                }
            })
            .collect();
        Self { entries }
    }

    /// Parse a palette from JSON (an array of entries).
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<PaletteEntry> = serde_json::from_str(json)?;
        if entries.is_empty() {
            return Err(Error::Palette("palette file has no entries".to_string()));
        }
        Ok(Self { entries })
    }

    /// Load a palette from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Apply a whitelist/blacklist filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransformDegenerate`] if no entries survive.
    pub fn filtered(&self, mode: FilterMode, names: &[String]) -> Result<Self> {
        let names: HashSet<&str> = names.iter().map(String::as_str).collect();
        let entries: Vec<PaletteEntry> = self
            .entries
            .iter()
            .filter(|e| match mode {
                FilterMode::All => true,
                FilterMode::Whitelist => names.contains(e.name.as_str()),
                FilterMode::Blacklist => !names.contains(e.name.as_str()),
            })
            .cloned()
            .collect();

        if entries.is_empty() {
            return Err(Error::degenerate(format!(
                "palette is empty after {mode:?} filter"
            )));
        }
        Ok(Self { entries })
    }

    /// Find the entry whose `side` face is closest to `color`.
    ///
    /// Returns the entry together with the sampled face colour.
    pub fn nearest(
        &self,
        color: Rgb,
        side: Side,
        metric: ColorMetric,
    ) -> Option<(&PaletteEntry, Rgb)> {
        let mut best: Option<(&PaletteEntry, Rgb, f64)> = None;
        for entry in &self.entries {
            let Some(face) = entry.face(side) else {
                continue;
            };
            let diff = metric.distance(color, face);
            if best.map_or(true, |(_, _, d)| diff < d) {
                best = Some((entry, face, diff));
            }
        }
        best.map(|(entry, face, _)| (entry, face))
    }

    /// Entries in palette order.
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the palette has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_all_faces() {
        let palette = Palette::builtin();
        assert_eq!(palette.len(), 16);
        for entry in palette.entries() {
            assert_eq!(entry.faces.len(), 6, "{}", entry.name);
        }
    }

    #[test]
    fn test_nearest_picks_closest() {
        let palette = Palette::builtin();
        let (entry, face) = palette
            .nearest([240, 100, 5], Side::Top, ColorMetric::Euclidean)
            .unwrap();
        assert_eq!(entry.name, "orange_tile");
        assert_eq!(face, [224, 97, 1]);
    }

    #[test]
    fn test_side_changes_sampled_face() {
        let palette = Palette::builtin();
        let (_, top) = palette
            .nearest([207, 213, 214], Side::Top, ColorMetric::Absolute)
            .unwrap();
        let (entry, bottom) = palette
            .nearest([104, 107, 107], Side::Bottom, ColorMetric::Absolute)
            .unwrap();
        assert_eq!(entry.name, "white_tile");
        assert_ne!(top, bottom);
    }

    #[test]
    fn test_face_fallback() {
        let entry = PaletteEntry {
            name: "only_north".into(),
            faces: BTreeMap::from([(Side::North, [1, 2, 3])]),
        };
        assert_eq!(entry.face(Side::Bottom), Some([1, 2, 3]));
    }

    #[test]
    fn test_whitelist_and_blacklist() {
        let palette = Palette::builtin();
        let names = vec!["red_tile".to_string(), "blue_tile".to_string()];

        let white = palette.filtered(FilterMode::Whitelist, &names).unwrap();
        assert_eq!(white.len(), 2);

        let black = palette.filtered(FilterMode::Blacklist, &names).unwrap();
        assert_eq!(black.len(), 14);
        assert!(black.entries().iter().all(|e| e.name != "red_tile"));

        let all = palette.filtered(FilterMode::All, &names).unwrap();
        assert_eq!(all.len(), 16);
    }

    #[test]
    fn test_empty_filter_result_is_degenerate() {
        let palette = Palette::builtin();
        let err = palette
            .filtered(FilterMode::Whitelist, &["nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::TransformDegenerate(_)));
    }

    #[test]
    fn test_from_json() {
        let json = r#"[{"name": "a", "faces": {"top": [1, 2, 3], "east": [4, 5, 6]}}]"#;
        let palette = Palette::from_json(json).unwrap();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.entries()[0].face(Side::East), Some([4, 5, 6]));
        assert!(Palette::from_json("[]").is_err());
    }
}
