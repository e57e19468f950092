use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidconv_av::{AudioMode, Container, ConversionOptions, VideoCodec};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderSettings,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// External tool locations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EncoderSettings {
    /// Path to ffmpeg (looked up on PATH if unset)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to ffprobe (looked up on PATH if unset)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Encoder thread count passed as `-threads`
    #[serde(default)]
    pub threads: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Number of files converted at once (default: 1)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Where outputs go; next to each source when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Append `_YYYY-MM-DD` to output names (default: true)
    #[serde(default = "default_date_suffix")]
    pub date_suffix: bool,

    /// Replace existing outputs
    #[serde(default)]
    pub overwrite: bool,
}

fn default_concurrency() -> usize {
    1
}

fn default_date_suffix() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            output_dir: None,
            date_suffix: default_date_suffix(),
            overwrite: false,
        }
    }
}

/// Output settings used when the command line does not override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_container")]
    pub container: Container,

    #[serde(default)]
    pub video_codec: Option<VideoCodec>,

    #[serde(default)]
    pub audio: Option<AudioMode>,

    #[serde(default)]
    pub crf: Option<u8>,

    #[serde(default)]
    pub preset: Option<String>,
}

fn default_container() -> Container {
    Container::Mp4
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            video_codec: None,
            audio: None,
            crf: None,
            preset: None,
        }
    }
}

impl DefaultsConfig {
    /// Conversion options built from these defaults.
    pub fn to_options(&self) -> ConversionOptions {
        ConversionOptions {
            video_codec: self.video_codec,
            audio: self.audio,
            crf: self.crf,
            preset: self.preset.clone(),
            ..ConversionOptions::new(self.container)
        }
    }
}
