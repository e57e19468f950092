mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use vidconv_av::{get_tool_path, EncoderConfig};

/// Highest CRF any supported encoder accepts.
const MAX_CRF: u8 = 63;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./vidconv.toml", "~/.config/vidconv/config.toml"];

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
pub fn validate_config(config: &Config) -> Result<()> {
    if config.batch.concurrency == 0 {
        anyhow::bail!("batch.concurrency cannot be 0");
    }

    if config.encoder.threads == Some(0) {
        anyhow::bail!("encoder.threads cannot be 0 (leave unset to let ffmpeg decide)");
    }

    if let Some(crf) = config.defaults.crf {
        if crf > MAX_CRF {
            anyhow::bail!("defaults.crf must be between 0 and {}, got {}", MAX_CRF, crf);
        }
    }

    config
        .defaults
        .to_options()
        .validate()
        .context("Invalid [defaults] section")?;

    if let Some(dir) = &config.batch.output_dir {
        if !dir.is_dir() {
            tracing::warn!("Output directory does not exist: {:?}", dir);
        }
    }

    Ok(())
}

impl Config {
    /// Resolve the encoder configuration.
    ///
    /// A configured tool path must exist; unset tools are looked up on PATH.
    pub fn encoder_config(&self) -> Result<EncoderConfig> {
        let ffmpeg = resolve_tool("ffmpeg", self.encoder.ffmpeg_path.as_deref())?;
        let ffprobe = resolve_tool("ffprobe", self.encoder.ffprobe_path.as_deref())?;
        Ok(EncoderConfig::new(ffmpeg, ffprobe).with_threads(self.encoder.threads))
    }
}

fn resolve_tool(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) => get_tool_path(name, Some(path))
            .with_context(|| format!("Configured {} not found", name)),
        // Missing tools surface at preflight with a clearer message.
        None => Ok(get_tool_path(name, None).unwrap_or_else(|_| PathBuf::from(name))),
    }
}
