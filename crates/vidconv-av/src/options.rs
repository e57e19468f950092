//! Conversion options and ffmpeg argument construction.

use crate::format::{AudioMode, Container, VideoCodec};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default constant rate factor.
pub const DEFAULT_CRF: u8 = 23;

/// Default x264/x265 preset.
pub const DEFAULT_PRESET: &str = "medium";

/// Lower bound for size-targeted video bitrates, in kbit/s.
pub const MIN_TARGET_KBPS: u32 = 100;

/// Upper bound for size-targeted video bitrates, in kbit/s.
pub const MAX_TARGET_KBPS: u32 = 8000;

const X26X_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// How a resized frame is fitted into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Keep the aspect ratio and pad with black bars.
    #[default]
    Pad,
    /// Scale to cover the box and crop the overflow.
    Crop,
}

impl std::str::FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pad" | "letterbox" => Ok(FitMode::Pad),
            "crop" => Ok(FitMode::Crop),
            _ => Err(format!("Unknown fit mode: {}", s)),
        }
    }
}

/// Resize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fit: FitMode,
    #[serde(default)]
    pub allow_upscale: bool,
}

impl Resize {
    /// The ffmpeg `-vf` filter chain for this resize.
    pub fn filter(&self) -> String {
        let (w, h) = (self.width, self.height);
        match self.fit {
            FitMode::Pad => {
                let direction = if self.allow_upscale { "increase" } else { "decrease" };
                format!(
                    "scale={w}:{h}:force_original_aspect_ratio={direction},\
                     pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
                )
            }
            FitMode::Crop => {
                format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}")
            }
        }
    }
}

/// Number of encoding passes for a size target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Passes {
    #[default]
    Single,
    Two,
}

/// Target output size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeTarget {
    /// Desired output size in MiB.
    pub megabytes: f64,
    #[serde(default)]
    pub passes: Passes,
}

/// Video bitrate needed to hit `size_mib` over `duration_secs`.
///
/// Clamped to [`MIN_TARGET_KBPS`, `MAX_TARGET_KBPS`].
///
/// # Example
///
/// ```
/// use vidconv_av::options::target_bitrate_kbps;
///
/// // 10 MiB over 60 s is about 1398 kbit/s.
/// assert_eq!(target_bitrate_kbps(10.0, 60.0), 1398);
/// ```
pub fn target_bitrate_kbps(size_mib: f64, duration_secs: f64) -> u32 {
    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return MAX_TARGET_KBPS;
    }
    let bytes = size_mib * 1024.0 * 1024.0;
    let kbps = (bytes * 8.0) / (duration_secs * 1000.0);
    (kbps as u32).clamp(MIN_TARGET_KBPS, MAX_TARGET_KBPS)
}

/// Options for a single conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Output container.
    pub container: Container,
    /// Video codec; `None` uses the container default.
    #[serde(default)]
    pub video_codec: Option<VideoCodec>,
    /// Audio handling; `None` uses the container default.
    #[serde(default)]
    pub audio: Option<AudioMode>,
    /// Constant rate factor; `None` uses [`DEFAULT_CRF`].
    #[serde(default)]
    pub crf: Option<u8>,
    /// Encoder preset for x264/x265; `None` uses [`DEFAULT_PRESET`].
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub resize: Option<Resize>,
    #[serde(default)]
    pub size_target: Option<SizeTarget>,
    /// Replace an existing target file.
    #[serde(default)]
    pub overwrite: bool,
}

impl ConversionOptions {
    /// Options for `container` with every other setting at its default.
    pub fn new(container: Container) -> Self {
        Self {
            container,
            video_codec: None,
            audio: None,
            crf: None,
            preset: None,
            resize: None,
            size_target: None,
            overwrite: false,
        }
    }

    /// Whether the video stream has to be re-encoded regardless of the
    /// requested codec.
    fn forces_reencode(&self) -> bool {
        self.resize.is_some() || self.size_target.is_some()
    }

    /// The video codec that will actually be used.
    ///
    /// A requested `copy` falls back to the container default when a resize or
    /// size target makes re-encoding unavoidable.
    pub fn effective_video_codec(&self) -> VideoCodec {
        match self.video_codec {
            Some(VideoCodec::Copy) if self.forces_reencode() => self.container.default_video_codec(),
            Some(codec) => codec,
            None => self.container.default_video_codec(),
        }
    }

    /// The audio handling that will actually be used.
    ///
    /// `copy` falls back to the container's encoded default when the source has
    /// no audio track, the video is being resized, or the container cannot carry
    /// the source's audio codec. `source_audio` is the primary track's codec.
    pub fn effective_audio(&self, source_audio: Option<&str>) -> AudioMode {
        match (self.audio, source_audio) {
            (Some(AudioMode::Copy), Some(codec))
                if self.resize.is_none() && self.container.can_copy_audio(codec) =>
            {
                AudioMode::Copy
            }
            (Some(AudioMode::Copy), _) | (None, _) => self.container.default_audio(),
            (Some(mode), _) => mode,
        }
    }

    /// The CRF that will be used.
    pub fn effective_crf(&self) -> u8 {
        self.crf.unwrap_or(DEFAULT_CRF)
    }

    /// The preset that will be used.
    pub fn effective_preset(&self) -> &str {
        self.preset.as_deref().unwrap_or(DEFAULT_PRESET)
    }

    /// Whether encoding needs the analysis pass.
    pub fn is_two_pass(&self) -> bool {
        matches!(
            self.size_target,
            Some(SizeTarget {
                passes: Passes::Two,
                ..
            })
        )
    }

    /// Check the options are internally consistent.
    pub fn validate(&self) -> Result<()> {
        let codec = self.effective_video_codec();
        if !self.container.supports_video(codec) {
            return Err(Error::InvalidOptions(format!(
                "{} cannot hold {} video",
                self.container, codec
            )));
        }

        // Fallbacks always land on the container default, which it can hold.
        if let Some(audio) = self.audio {
            if !self.container.supports_audio(audio) {
                return Err(Error::InvalidOptions(format!(
                    "{} cannot hold {} audio",
                    self.container, audio
                )));
            }
        }

        if let Some(crf) = self.crf {
            if crf > codec.max_crf() {
                return Err(Error::InvalidOptions(format!(
                    "crf {} out of range for {} (0-{})",
                    crf,
                    codec,
                    codec.max_crf()
                )));
            }
        }

        if let Some(preset) = &self.preset {
            if codec.supports_preset() && !X26X_PRESETS.contains(&preset.as_str()) {
                return Err(Error::InvalidOptions(format!("unknown preset: {}", preset)));
            }
        }

        if let Some(resize) = &self.resize {
            if resize.width == 0 || resize.height == 0 {
                return Err(Error::InvalidOptions(
                    "resize dimensions must be positive".to_string(),
                ));
            }
            if resize.width % 2 != 0 || resize.height % 2 != 0 {
                return Err(Error::InvalidOptions(
                    "resize dimensions must be even".to_string(),
                ));
            }
        }

        if let Some(target) = &self.size_target {
            if !(target.megabytes > 0.0 && target.megabytes.is_finite()) {
                return Err(Error::InvalidOptions(
                    "target size must be a positive number of MiB".to_string(),
                ));
            }
            if target.passes == Passes::Two && !codec.supports_two_pass() {
                return Err(Error::InvalidOptions(format!(
                    "two-pass encoding is not supported for {}",
                    codec
                )));
            }
        }

        Ok(())
    }
}

/// Facts about the source and workspace needed to build the command lines.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    /// Source duration in seconds, if known.
    pub duration_secs: Option<f64>,
    /// Codec of the source's primary audio track; `None` when it has none.
    pub source_audio: Option<&'a str>,
    /// Prefix for two-pass statistics files.
    pub pass_log: &'a Path,
    /// Encoder thread count (`-threads`).
    pub threads: Option<u32>,
}

/// One ffmpeg invocation and the slice of overall progress it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePass {
    pub args: Vec<String>,
    /// Overall progress (0-100) when this pass starts.
    pub progress_offset: f32,
    /// Share of overall progress (0-100) this pass accounts for.
    pub progress_span: f32,
}

impl EncodePass {
    /// Map pass-local progress (0-100) onto overall progress.
    pub fn overall(&self, pass_percent: f32) -> f32 {
        (self.progress_offset + pass_percent.clamp(0.0, 100.0) * self.progress_span / 100.0)
            .clamp(0.0, 100.0)
    }
}

/// Build the ffmpeg invocations for a conversion.
///
/// Returns one pass normally, or an analysis pass followed by the encoding pass
/// for two-pass size targets.
pub fn build_passes(options: &ConversionOptions, ctx: &EncodeContext<'_>) -> Result<Vec<EncodePass>> {
    options.validate()?;

    let codec = options.effective_video_codec();
    let audio = options.effective_audio(ctx.source_audio);

    let bitrate = match &options.size_target {
        Some(target) => {
            let duration = ctx.duration_secs.ok_or_else(|| {
                Error::input(ctx.input, "could not determine duration for size target")
            })?;
            Some(target_bitrate_kbps(target.megabytes, duration))
        }
        None => None,
    };

    let pass_log = ctx.pass_log.to_string_lossy().to_string();

    if let (true, Some(kbps)) = (options.is_two_pass(), bitrate) {
        let mut first = input_args(ctx);
        first.extend(video_encoder_args(options, codec));
        first.extend(strings(&["-b:v", &format!("{}k", kbps)]));
        first.extend(strings(&["-pass", "1", "-passlogfile", &pass_log]));
        first.extend(strings(&["-an", "-f", "null"]));
        first.extend(progress_args());
        first.push("-".to_string());

        let mut second = input_args(ctx);
        second.extend(video_encoder_args(options, codec));
        second.extend(strings(&[
            "-b:v",
            &format!("{}k", kbps),
            "-maxrate",
            &format!("{}k", kbps),
            "-bufsize",
            &format!("{}k", kbps * 2),
        ]));
        second.extend(strings(&["-pass", "2", "-passlogfile", &pass_log]));
        second.extend(strings(audio.ffmpeg_args()));
        second.extend(output_args(options.container, ctx.output));

        return Ok(vec![
            EncodePass {
                args: first,
                progress_offset: 0.0,
                progress_span: 50.0,
            },
            EncodePass {
                args: second,
                progress_offset: 50.0,
                progress_span: 50.0,
            },
        ]);
    }

    let mut args = input_args(ctx);
    if codec.is_encoding() {
        args.extend(video_encoder_args(options, codec));
        match bitrate {
            Some(kbps) => args.extend(strings(&[
                "-b:v",
                &format!("{}k", kbps),
                "-maxrate",
                &format!("{}k", kbps),
                "-bufsize",
                &format!("{}k", kbps * 2),
            ])),
            None => args.extend(quality_args(options, codec)),
        }
    } else {
        args.extend(strings(&["-c:v", "copy"]));
    }
    args.extend(strings(audio.ffmpeg_args()));
    args.extend(output_args(options.container, ctx.output));

    Ok(vec![EncodePass {
        args,
        progress_offset: 0.0,
        progress_span: 100.0,
    }])
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn input_args(ctx: &EncodeContext<'_>) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-nostdin", "-y", "-i"]);
    args.push(ctx.input.to_string_lossy().to_string());
    if let Some(threads) = ctx.threads {
        args.extend(strings(&["-threads", &threads.to_string()]));
    }
    args
}

fn video_encoder_args(options: &ConversionOptions, codec: VideoCodec) -> Vec<String> {
    let mut args = strings(&["-c:v", codec.ffmpeg_encoder()]);
    if let Some(resize) = &options.resize {
        args.extend(strings(&["-vf", &resize.filter()]));
    }
    if codec == VideoCodec::H264 {
        args.extend(strings(&["-pix_fmt", "yuv420p"]));
    }
    args
}

fn quality_args(options: &ConversionOptions, codec: VideoCodec) -> Vec<String> {
    let crf = options.effective_crf();
    match codec {
        VideoCodec::H264 | VideoCodec::H265 => strings(&[
            "-crf",
            &crf.to_string(),
            "-preset",
            options.effective_preset(),
        ]),
        VideoCodec::Vp9 | VideoCodec::Av1 => strings(&["-crf", &crf.to_string(), "-b:v", "0"]),
        VideoCodec::Mpeg4 => {
            let qscale = (crf / 3).clamp(2, 31);
            strings(&["-q:v", &qscale.to_string()])
        }
        VideoCodec::Copy => Vec::new(),
    }
}

fn output_args(container: Container, output: &Path) -> Vec<String> {
    let mut args = strings(&["-f", container.ffmpeg_format_name()]);
    if container.supports_faststart() {
        args.extend(strings(&["-movflags", "+faststart"]));
    }
    args.extend(progress_args());
    args.push(output.to_string_lossy().to_string());
    args
}

fn progress_args() -> Vec<String> {
    strings(&["-progress", "pipe:1", "-nostats"])
}
