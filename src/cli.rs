use clap::{Args, Parser, Subcommand, ValueEnum};
use mosaicforge::config::MosaicConfig;
use mosaicforge_tiles::{ColorMetric, CropRect, FilterMode, ScaleSpec, Side, TransformKind};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mosaicforge")]
#[command(author, version, about = "Turn videos and images into palette-tile mosaics")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert an image, or every image in a directory
    Image {
        /// Image file or directory of images
        #[arg(required = true)]
        input: PathBuf,

        /// Output file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Crop region as x1,y1,x2,y2 (empty parts and `max` allowed)
        #[arg(long)]
        crop: Option<CropRect>,

        #[command(flatten)]
        mosaic: MosaicArgs,
    },

    /// Convert a video through the frame pipeline
    Video {
        /// Video file
        #[arg(required = true)]
        input: PathBuf,

        /// Output file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Transform workers (1-16)
        #[arg(short = 'j', long)]
        process_count: Option<usize>,

        /// Frames per second to sample and encode
        #[arg(short = 'r', long)]
        frame_rate: Option<u32>,

        /// Extract lossless frames
        #[arg(long)]
        quality: bool,

        /// Staging directory root
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// How progress is reported
        #[arg(long, value_enum, default_value_t = ProgressStyleArg::Bars)]
        progress: ProgressStyleArg,

        #[command(flatten)]
        mosaic: MosaicArgs,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Progress output of the video command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressStyleArg {
    /// Extract and Process progress bars
    Bars,
    /// One JSON event per line on stdout
    Json,
    /// Nothing
    None,
}

/// Mosaic options shared by both conversion commands.
#[derive(Args, Debug, Clone, Default)]
pub struct MosaicArgs {
    /// Transform kind (palette-image, lamps-image)
    #[arg(short, long)]
    pub kind: Option<TransformKind>,

    /// Scale multiplier (`1`, `0.5`, `50%`, `2x`)
    #[arg(short, long)]
    pub scale: Option<ScaleSpec>,

    /// Palette face to sample (top, bottom, north, south, east, west)
    #[arg(long)]
    pub side: Option<Side>,

    /// Palette filter mode (all, whitelist, blacklist)
    #[arg(long)]
    pub mode: Option<FilterMode>,

    /// Palette entry name for the filter (repeatable)
    #[arg(long = "filter")]
    pub filter: Vec<String>,

    /// File with palette entry names, one per line
    #[arg(long)]
    pub filter_file: Option<PathBuf>,

    /// Colour metric (absolute, euclidean, weighted-euclidean, redmean, cie76)
    #[arg(long)]
    pub metric: Option<ColorMetric>,

    /// JSON palette file
    #[arg(long)]
    pub palette: Option<PathBuf>,

    /// Lamp brightness threshold (0-255)
    #[arg(long)]
    pub brightness: Option<u8>,

    /// Dither the lamp threshold
    #[arg(long)]
    pub dither: bool,
}

impl MosaicArgs {
    /// Overlay the flags that were given onto `mosaic`.
    pub fn apply(&self, mosaic: &mut MosaicConfig) {
        if let Some(kind) = self.kind {
            mosaic.kind = kind;
        }
        if let Some(scale) = &self.scale {
            mosaic.scale = scale.clone();
        }
        if let Some(side) = self.side {
            mosaic.side = side;
        }
        if let Some(mode) = self.mode {
            mosaic.mode = mode;
        }
        if !self.filter.is_empty() {
            let mut filter = self.filter.clone();
            filter.extend(mosaic.filter.iter().cloned());
            mosaic.filter = filter;
        }
        if let Some(path) = &self.filter_file {
            mosaic.filter_file = Some(path.clone());
        }
        if let Some(metric) = self.metric {
            mosaic.color_metric = metric;
        }
        if let Some(path) = &self.palette {
            mosaic.palette_file = Some(path.clone());
        }
        if let Some(brightness) = self.brightness {
            mosaic.brightness = brightness;
        }
        if self.dither {
            mosaic.dither = true;
        }
    }
}
