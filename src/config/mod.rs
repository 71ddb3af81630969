mod types;

pub use types::*;

use anyhow::{Context, Result};
use mosaicforge_tiles::{FilterMode, Palette};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config).with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./mosaicforge.toml", "~/.config/mosaicforge/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let pipeline = &config.pipeline;

    if pipeline.frame_rate == 0 {
        return Err(crate::Error::config("frame_rate cannot be 0"));
    }
    if !(pipeline.overlap_threshold > 0.0 && pipeline.overlap_threshold <= 1.0) {
        return Err(crate::Error::config(format!(
            "overlap_threshold must be in (0, 1], got {}",
            pipeline.overlap_threshold
        )));
    }
    if pipeline.poll_interval_ms == 0 || pipeline.event_poll_ms == 0 {
        return Err(crate::Error::config("poll intervals cannot be 0"));
    }
    if pipeline.job_timeout_secs == 0 {
        return Err(crate::Error::config("job_timeout_secs cannot be 0"));
    }
    if pipeline.crf > 51 {
        return Err(crate::Error::config(format!(
            "crf must be in 0..=51, got {}",
            pipeline.crf
        )));
    }
    if !(1..=crate::pipeline::MAX_WORKERS).contains(&pipeline.process_count) {
        tracing::warn!(
            "process_count {} out of range, clamping to 1..={}",
            pipeline.process_count,
            crate::pipeline::MAX_WORKERS
        );
    } else if pipeline.process_count > num_cpus::get() {
        tracing::debug!(
            "process_count {} exceeds the {} available CPUs",
            pipeline.process_count,
            num_cpus::get()
        );
    }

    config.mosaic.scale.tile_step()?;

    if let Some(path) = &config.mosaic.palette_file {
        if !path.exists() {
            tracing::warn!("Palette file does not exist: {:?}", path);
        }
    }

    Ok(())
}

/// Read a palette filter file: one name per line, `#` and `//` start comments.
pub fn read_filter_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filter file: {:?}", path))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .map(str::to_string)
        .collect())
}

/// Merge filter lists, keeping first occurrence order.
pub fn merge_filters(lists: &[&[String]]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    lists
        .iter()
        .flat_map(|list| list.iter())
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Build the palette described by the `[mosaic]` section.
pub fn build_palette(mosaic: &MosaicConfig) -> Result<Palette> {
    let palette = match &mosaic.palette_file {
        Some(path) => Palette::load(path)
            .with_context(|| format!("Failed to load palette: {:?}", path))?,
        None => Palette::builtin(),
    };

    if mosaic.mode == FilterMode::All {
        return Ok(palette);
    }

    let from_file = match &mosaic.filter_file {
        Some(path) => read_filter_file(path)?,
        None => Vec::new(),
    };
    let names = merge_filters(&[mosaic.filter.as_slice(), from_file.as_slice()]);

    let filtered = palette.filtered(mosaic.mode, &names)?;
    tracing::debug!(
        "Palette filtered to {} of {} entries",
        filtered.len(),
        palette.len()
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.pipeline.process_count, 2);
        assert_eq!(config.pipeline.frame_rate, 12);
        assert!((config.pipeline.overlap_threshold - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.pipeline.crf, 20);
        assert_eq!(config.mosaic.brightness, 127);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            process_count = 4
            quality = true
            missing_frames = "skip"

            [cache]
            root = "/tmp/mf"

            [mosaic]
            kind = "lamps-image"
            scale = "50%"
            side = "north"
            mode = "blacklist"
            filter = ["red_tile"]
            color_metric = "cie76"
            dither = true
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.process_count, 4);
        assert!(config.pipeline.quality);
        assert_eq!(config.pipeline.missing_frames, crate::pipeline::MissingFramePolicy::Skip);
        assert_eq!(config.cache.root, Path::new("/tmp/mf"));
        assert_eq!(config.mosaic.kind, mosaicforge_tiles::TransformKind::LampsImage);
        assert_eq!(config.mosaic.scale.tile_step().unwrap(), 32);
        assert_eq!(config.mosaic.side, mosaicforge_tiles::Side::North);
        assert!(config.mosaic.transform_options().dither);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.pipeline.frame_rate = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.pipeline.overlap_threshold = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.pipeline.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.mosaic.scale = 0.0.into();
        assert!(matches!(
            validate_config(&config),
            Err(crate::Error::InvalidScale(_))
        ));
    }

    #[test]
    fn test_filter_file_and_merge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment\nred_tile\n\n// another\nblue_tile\nred_tile").unwrap();

        let from_file = read_filter_file(file.path()).unwrap();
        assert_eq!(from_file, vec!["red_tile", "blue_tile", "red_tile"]);

        let cli = vec!["blue_tile".to_string(), "lime_tile".to_string()];
        let merged = merge_filters(&[cli.as_slice(), from_file.as_slice()]);
        assert_eq!(merged, vec!["blue_tile", "lime_tile", "red_tile"]);
    }

    #[test]
    fn test_build_palette_whitelist() {
        let mosaic = MosaicConfig {
            mode: FilterMode::Whitelist,
            filter: vec!["red_tile".to_string(), "black_tile".to_string()],
            ..Default::default()
        };
        assert_eq!(build_palette(&mosaic).unwrap().len(), 2);

        let mosaic = MosaicConfig {
            mode: FilterMode::Whitelist,
            filter: vec!["missing".to_string()],
            ..Default::default()
        };
        assert!(build_palette(&mosaic).is_err());
    }
}
