//! # vidconv-av
//!
//! ffmpeg-backed encoder adapter for vidconv.
//!
//! This crate provides functionality for:
//! - Probing media files with ffprobe (duration, streams, sizes)
//! - Building ffmpeg command lines from [`ConversionOptions`]
//! - Running ffmpeg with progress reporting and cancellation
//! - Staging output so a failed conversion never leaves a partial file
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use vidconv_av::{
//!     no_progress, Container, ConversionOptions, EncodeRequest, Encoder, EncoderConfig,
//!     FfmpegEncoder,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> vidconv_av::Result<()> {
//! let encoder = FfmpegEncoder::new(EncoderConfig::discover());
//! encoder.preflight().await?;
//!
//! let request = EncodeRequest {
//!     source: "/videos/a.mov".into(),
//!     target: "/videos/a.mp4".into(),
//!     options: ConversionOptions::new(Container::Mp4),
//! };
//! let outcome = encoder
//!     .convert(&request, no_progress(), CancellationToken::new())
//!     .await?;
//! println!("wrote {} bytes", outcome.bytes_written);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod encoder;
pub mod format;
pub mod options;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod tools;
pub mod workspace;

// Re-exports
pub use encoder::{
    no_progress, EncodeOutcome, EncodeRequest, Encoder, EncoderConfig, FfmpegEncoder,
    ProgressCallback,
};
pub use error::{Error, ErrorKind, Result};
pub use format::{AudioMode, Container, VideoCodec};
pub use options::{ConversionOptions, FitMode, Passes, Resize, SizeTarget};
pub use probe::{format_duration, format_file_size, AudioTrack, MediaInfo, VideoTrack};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, ToolInfo};
pub use workspace::Workspace;
