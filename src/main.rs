mod cli;
mod render;

use mosaicforge::{
    config,
    output::{self, MediaKind},
    pipeline::{FfmpegBackend, Pipeline, PipelineSettings, ProgressEvent, ProgressSink},
};
use mosaicforge_av::{CacheSet, ToolPaths};
use mosaicforge_tiles::{
    CropRect, FrameTransform, MosaicTransform, TransformJob, TransformOutcome,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, MosaicArgs, ProgressStyleArg};
use indicatif::MultiProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mosaicforge=trace,mosaicforge_av=debug,mosaicforge_tiles=debug".to_string()
        } else {
            "mosaicforge=info,mosaicforge_av=info,mosaicforge_tiles=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Image {
            input,
            output,
            crop,
            mosaic,
        } => run_image(
            &input,
            output.as_deref(),
            crop,
            &mosaic,
            cli.config.as_deref(),
        ),
        Commands::Video {
            input,
            output,
            process_count,
            frame_rate,
            quality,
            cache_dir,
            progress,
            mosaic,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(n) = process_count {
                config.pipeline.process_count = n;
            }
            if let Some(fps) = frame_rate {
                config.pipeline.frame_rate = fps;
            }
            if quality {
                config.pipeline.quality = true;
            }
            if let Some(dir) = cache_dir {
                config.cache.root = dir;
            }
            run_video(&input, output.as_deref(), config, &mosaic, progress)
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mosaicforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Build the transform described by the `[mosaic]` section plus CLI flags.
fn mosaic_transform(config: &mut config::Config, args: &MosaicArgs) -> Result<MosaicTransform> {
    args.apply(&mut config.mosaic);
    config::validate_config(config)?;
    let palette = config::build_palette(&config.mosaic)?;
    tracing::debug!("Using {} palette entries", palette.len());
    Ok(MosaicTransform::new(palette))
}

fn run_image(
    input: &Path,
    output: Option<&Path>,
    crop: Option<CropRect>,
    args: &MosaicArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    let transform = mosaic_transform(&mut config, args)?;
    let stamp = output::timestamp(chrono::Local::now());

    if !input.exists() {
        anyhow::bail!("Input does not exist: {:?}", input);
    }

    let job_for = |source: &Path, destination: PathBuf| {
        TransformJob::new(
            source,
            destination,
            config.mosaic.kind,
            config.mosaic.scale.clone(),
        )
        .with_crop(crop)
        .with_options(config.mosaic.transform_options())
    };

    if input.is_dir() {
        let mut images: Vec<PathBuf> = std::fs::read_dir(input)
            .with_context(|| format!("Failed to read directory: {:?}", input))?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && MediaKind::detect(p) == Some(MediaKind::Image))
            .collect();
        images.sort();

        if images.is_empty() {
            anyhow::bail!("No images found in {:?}", input);
        }

        let out_dir = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.join(format!("output{stamp}")));
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

        let multi = MultiProgress::new();
        let files = render::files_bar(&multi, images.len());
        let columns = render::column_bar(&multi);
        let mut written = 0;

        for image in &images {
            let job = job_for(image, output::batch_output(&out_dir, image, MediaKind::Image));
            let mut sink = render::column_sink(&columns);
            match transform.transform(&job, &mut sink) {
                Ok(TransformOutcome::Written(_)) => written += 1,
                Ok(TransformOutcome::Degenerate(reason)) => {
                    tracing::warn!("Skipped {:?}: {}", image, reason)
                }
                Err(e) => tracing::warn!("Failed to convert {:?}: {}", image, e),
            }
            files.inc(1);
        }

        columns.finish_and_clear();
        files.finish();
        println!(
            "Converted {}/{} images into {}",
            written,
            images.len(),
            out_dir.display()
        );
        return Ok(());
    }

    let resolved = output::resolve_output(input, output, MediaKind::Image, &stamp);
    if let Some(warning) = &resolved.warning {
        tracing::warn!("{}", warning);
    }

    let multi = MultiProgress::new();
    let bar = render::column_bar(&multi);
    let outcome = {
        let mut sink = render::column_sink(&bar);
        transform
            .transform(&job_for(input, resolved.path.clone()), &mut sink)
            .map_err(mosaicforge::Error::from)?
    };
    bar.finish_and_clear();

    match outcome {
        TransformOutcome::Written(path) => {
            println!("Output: {}", path.display());
            Ok(())
        }
        TransformOutcome::Degenerate(reason) => {
            Err(mosaicforge::Error::TransformDegenerate(reason).into())
        }
    }
}

fn run_video(
    input: &Path,
    output: Option<&Path>,
    mut config: config::Config,
    args: &MosaicArgs,
    progress: ProgressStyleArg,
) -> Result<()> {
    let transform = mosaic_transform(&mut config, args)?;

    let tools = ToolPaths::locate(
        config.tools.ffmpeg_path.as_deref(),
        config.tools.ffprobe_path.as_deref(),
    )?;
    let backend = FfmpegBackend::new(tools).with_timeouts(
        Duration::from_secs(config.tools.extract_timeout_secs),
        Duration::from_secs(config.tools.encode_timeout_secs),
    );

    let stamp = output::timestamp(chrono::Local::now());
    let resolved = output::resolve_output(input, output, MediaKind::Video, &stamp);
    if let Some(warning) = &resolved.warning {
        tracing::warn!("{}", warning);
    }

    let pipeline = Pipeline::new(
        PipelineSettings::from_config(&config),
        CacheSet::new(&config.cache.root),
        Arc::new(backend),
        Arc::new(transform),
    );

    let mut sink: Box<dyn ProgressSink> = match progress {
        ProgressStyleArg::Bars => Box::new(render::BarSink::new()),
        ProgressStyleArg::Json => Box::new(render::JsonLinesSink::new(std::io::stdout())),
        ProgressStyleArg::None => Box::new(|_: ProgressEvent| {}),
    };

    let report = pipeline
        .run(input, &resolved.path, sink.as_mut())
        .with_context(|| format!("Failed to convert {:?}", input))?;
    drop(sink);

    if progress == ProgressStyleArg::Json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    println!("\nOutput: {}", report.output.display());
    println!(
        "Frames: {}/{} transformed{}",
        report.transformed,
        report.frame_total,
        if report.audio { ", with audio" } else { "" }
    );
    for failure in &report.failures {
        println!("  frame {}: {}", failure.index, failure.reason);
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let mut paths = ToolPaths::default();
    if let Some(path) = config.tools.ffmpeg_path {
        paths.ffmpeg = path;
    }
    if let Some(path) = config.tools.ffprobe_path {
        paths.ffprobe = path;
    }

    let mut all_ok = true;

    for tool in paths.report() {
        let status = if tool.available() {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to convert videos.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            println!("Default config:");
            print_config(&config::Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &config::Config) {
    let p = &config.pipeline;
    println!(
        "  Pipeline: {} workers, {} fps, {} frames, missing frames: {}",
        p.process_count,
        p.frame_rate,
        if p.quality { "png" } else { "jpg" },
        p.missing_frames
    );
    println!("  Cache: {}", config.cache.root.display());
    println!(
        "  Mosaic: {}, scale {}, {} metric",
        config.mosaic.kind,
        config.mosaic.scale,
        config.mosaic.color_metric.name()
    );
}
