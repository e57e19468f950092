use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use vidconv_av::{AudioMode, Container, FitMode, VideoCodec};

#[derive(Parser)]
#[command(name = "vidconv")]
#[command(author, version, about = "Batch video converter driving ffmpeg")]
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
    /// Convert one or more video files
    Convert(ConvertArgs),

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Source files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output container (mp4, mov, avi, webm)
    #[arg(short, long)]
    pub format: Option<Container>,

    /// Video codec (copy, h264, h265, vp9, av1, mpeg4)
    #[arg(long)]
    pub video_codec: Option<VideoCodec>,

    /// Audio handling (copy, aac, mp3, opus, none)
    #[arg(long)]
    pub audio: Option<AudioMode>,

    /// Constant rate factor
    #[arg(long)]
    pub crf: Option<u8>,

    /// x264/x265 preset
    #[arg(long)]
    pub preset: Option<String>,

    /// Output directory (defaults to each source's directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Files converted at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Resize width in pixels
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Resize height in pixels
    #[arg(long, requires = "width")]
    pub height: Option<u32>,

    /// How a resized frame fits the box (pad, crop) [default: pad]
    #[arg(long, requires = "width")]
    pub fit: Option<FitMode>,

    /// Allow scaling above the source size
    #[arg(long, requires = "width")]
    pub upscale: bool,

    /// Target output size in MiB
    #[arg(long)]
    pub target_size_mb: Option<f64>,

    /// Use two-pass encoding for the size target
    #[arg(long, requires = "target_size_mb")]
    pub two_pass: bool,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Do not append the date to output names
    #[arg(long)]
    pub no_date_suffix: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}
