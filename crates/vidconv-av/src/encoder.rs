//! The encoder adapter: one source file to one target file.

use crate::options::{build_passes, ConversionOptions, EncodeContext};
use crate::probe::probe_with_ffprobe;
use crate::progress::percent;
use crate::runner::{run_ffmpeg, DEFAULT_STDERR_TAIL};
use crate::tools::check_tool;
use crate::{Error, Result, Workspace};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Progress callback: `(percent 0-100, stage label)`.
pub type ProgressCallback = Arc<dyn Fn(f32, &str) + Send + Sync>;

/// A progress callback that discards updates.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_: f32, _: &str| {})
}

/// One conversion to perform.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub source: PathBuf,
    pub target: PathBuf,
    pub options: ConversionOptions,
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    /// Final path of the written file.
    pub output: PathBuf,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Converts a single file.
///
/// Implementations must leave no partial target behind when they fail, and
/// must stop promptly once `cancel` fires.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Verify the encoder can run at all.
    ///
    /// A failure here means no conversion can succeed.
    async fn preflight(&self) -> Result<()> {
        Ok(())
    }

    /// Convert `request.source` into `request.target`.
    async fn convert(
        &self,
        request: &EncodeRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<EncodeOutcome>;
}

/// Locations and tuning for the external tools.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Value for `-threads`; `None` lets ffmpeg decide.
    pub threads: Option<u32>,
    /// Number of stderr lines attached to encoding errors.
    pub stderr_tail_lines: usize,
}

impl EncoderConfig {
    /// Configuration with explicit tool paths.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            threads: None,
            stderr_tail_lines: DEFAULT_STDERR_TAIL,
        }
    }

    /// Resolve `ffmpeg` and `ffprobe` on PATH.
    ///
    /// A tool that cannot be found keeps its bare name, so the failure shows
    /// up as [`Error::ToolNotFound`] at preflight.
    pub fn discover() -> Self {
        let ffmpeg = which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg"));
        let ffprobe = which::which("ffprobe").unwrap_or_else(|_| PathBuf::from("ffprobe"));
        Self::new(ffmpeg, ffprobe)
    }

    pub fn with_threads(mut self, threads: Option<u32>) -> Self {
        self.threads = threads;
        self
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

/// [`Encoder`] backed by the ffmpeg and ffprobe command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn preflight(&self) -> Result<()> {
        let ffmpeg = self.config.ffmpeg.clone();
        let ffprobe = self.config.ffprobe.clone();

        let infos = tokio::task::spawn_blocking(move || [check_tool(&ffmpeg), check_tool(&ffprobe)])
            .await
            .map_err(|e| Error::encoding("preflight", e.to_string()))?;

        let paths = [&self.config.ffmpeg, &self.config.ffprobe];
        for (info, path) in infos.iter().zip(paths) {
            if !info.available {
                return Err(Error::tool_not_found(path.display().to_string()));
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "{} available: {}",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        }

        Ok(())
    }

    async fn convert(
        &self,
        request: &EncodeRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<EncodeOutcome> {
        let started = Instant::now();

        request.options.validate()?;
        check_source(&request.source)?;
        check_target(&request.source, &request.target, request.options.overwrite)?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        progress(0.0, "probing");
        let ffprobe = self.config.ffprobe.clone();
        let source = request.source.clone();
        let info = tokio::task::spawn_blocking(move || probe_with_ffprobe(&ffprobe, &source))
            .await
            .map_err(|e| Error::encoding("ffprobe", format!("probe task failed: {}", e)))??;

        if info.video_tracks.is_empty() {
            return Err(Error::input(&request.source, "no video stream found"));
        }

        let duration = info.duration_secs();
        let workspace = Workspace::new(&request.target)?;
        let pass_log = workspace.temp_file("passlog");

        let ctx = EncodeContext {
            input: &request.source,
            output: workspace.staging(),
            duration_secs: duration,
            source_audio: info.primary_audio().map(|a| a.codec.as_str()),
            pass_log: &pass_log,
            threads: self.config.threads,
        };
        let passes = build_passes(&request.options, &ctx)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Converting {:?} -> {:?} ({} pass{})",
            request.source,
            request.target,
            passes.len(),
            if passes.len() == 1 { "" } else { "es" }
        );

        let total = passes.len();
        for (i, pass) in passes.iter().enumerate() {
            let label = if total > 1 {
                format!("pass {}/{}", i + 1, total)
            } else {
                "encoding".to_string()
            };
            progress(pass.overall(0.0), &label);

            run_ffmpeg(
                &self.config.ffmpeg,
                &pass.args,
                &cancel,
                self.config.stderr_tail_lines,
                |secs| {
                    if let Some(d) = duration {
                        progress(pass.overall(percent(secs, d)), &label);
                    }
                },
            )
            .await?;
        }

        let output = workspace.finalize(request.options.overwrite)?;
        let bytes_written = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        progress(100.0, "done");

        Ok(EncodeOutcome {
            output,
            bytes_written,
            elapsed: started.elapsed(),
        })
    }
}

fn check_source(source: &Path) -> Result<()> {
    let metadata = std::fs::metadata(source)
        .map_err(|_| Error::input(source, "source file does not exist"))?;
    if !metadata.is_file() {
        return Err(Error::input(source, "source is not a regular file"));
    }
    std::fs::File::open(source)
        .map_err(|e| Error::input(source, format!("source file is not readable: {}", e)))?;
    Ok(())
}

fn check_target(source: &Path, target: &Path, overwrite: bool) -> Result<()> {
    if let (Ok(a), Ok(b)) = (source.canonicalize(), target.canonicalize()) {
        if a == b {
            return Err(Error::output(target, "target is the source file"));
        }
    }

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(Error::output(target, "output directory does not exist"));
    }

    if target.exists() {
        if !target.is_file() {
            return Err(Error::output(target, "target is not a regular file"));
        }
        if !overwrite {
            return Err(Error::output(target, "target already exists"));
        }
    }

    Ok(())
}
