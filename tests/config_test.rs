//! Integration tests for config file discovery and loading.

use mosaicforge::config::{self, Config};
use mosaicforge::pipeline::{MissingFramePolicy, PipelineSettings};
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Run `f` with the working directory set to `dir`.
fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir).unwrap();
    let result = f();
    std::env::set_current_dir(previous).unwrap();
    result
}

#[test]
#[serial]
fn local_config_file_is_discovered() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("mosaicforge.toml"),
        "[pipeline]\nprocess_count = 6\nmissing_frames = \"skip\"\n",
    )
    .unwrap();

    let config = in_dir(temp.path(), || config::load_config_or_default(None)).unwrap();
    assert_eq!(config.pipeline.process_count, 6);
    assert_eq!(config.pipeline.missing_frames, MissingFramePolicy::Skip);
}

#[test]
#[serial]
fn explicit_path_wins_over_local_file() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("mosaicforge.toml"), "[pipeline]\nframe_rate = 30\n").unwrap();
    let explicit = temp.path().join("other.toml");
    fs::write(&explicit, "[pipeline]\nframe_rate = 8\n").unwrap();

    let config = in_dir(temp.path(), || {
        config::load_config_or_default(Some(explicit.as_path()))
    })
    .unwrap();
    assert_eq!(config.pipeline.frame_rate, 8);
}

#[test]
#[serial]
fn broken_local_file_is_reported() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("mosaicforge.toml"), "[pipeline\n").unwrap();

    let err = in_dir(temp.path(), || config::load_config_or_default(None)).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let err = config::load_config(Path::new("/nonexistent/mosaicforge.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn settings_carry_mosaic_options() {
    let config: Config = toml::from_str(
        r#"
        [pipeline]
        poll_interval_ms = 50
        job_timeout_secs = 30

        [mosaic]
        kind = "lamps-image"
        brightness = 90
        dither = true
        "#,
    )
    .unwrap();

    let settings = PipelineSettings::from_config(&config);
    assert_eq!(settings.poll_interval.as_millis(), 50);
    assert_eq!(settings.job_timeout.as_secs(), 30);
    assert_eq!(settings.options.brightness, 90);
    assert!(settings.options.dither);
    assert!(settings.crop.is_none());
}
