mod cli;

use vidconv::{
    batch::{BatchError, BatchReport, JobStatus, Orchestrator},
    config,
    events::BatchEvent,
};
use vidconv_av::{
    check_tools, format_duration, format_file_size, probe::probe_with_ffprobe,
    ConversionOptions, FfmpegEncoder, Passes, Resize, SizeTarget,
};
use vidconv_common::paths::{is_video_file, output_path_for};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConvertArgs};
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// How long to wait for the progress display to print the last events.
const RENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidconv=trace,vidconv_av=debug".to_string()
        } else {
            "vidconv=info,vidconv_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(args, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => probe_file(&file, json, cli.config.as_deref()),
        Commands::CheckTools => check_tools_cmd(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidconv {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Merge command-line flags over the configured defaults.
fn build_options(args: &ConvertArgs, config: &config::Config) -> Result<ConversionOptions> {
    let mut options = config.defaults.to_options();

    if let Some(container) = args.format {
        options.container = container;
        // Configured codec defaults may not fit a container picked on the command line.
        if !container.supports_video(options.effective_video_codec()) {
            options.video_codec = None;
        }
        if let Some(audio) = options.audio {
            if !container.supports_audio(audio) {
                options.audio = None;
            }
        }
    }
    if args.video_codec.is_some() {
        options.video_codec = args.video_codec;
    }
    if args.audio.is_some() {
        options.audio = args.audio;
    }
    if args.crf.is_some() {
        options.crf = args.crf;
    }
    if args.preset.is_some() {
        options.preset = args.preset.clone();
    }

    if let (Some(width), Some(height)) = (args.width, args.height) {
        options.resize = Some(Resize {
            width,
            height,
            fit: args.fit.unwrap_or_default(),
            allow_upscale: args.upscale,
        });
    }

    if let Some(megabytes) = args.target_size_mb {
        options.size_target = Some(SizeTarget {
            megabytes,
            passes: if args.two_pass {
                Passes::Two
            } else {
                Passes::Single
            },
        });
    }

    options.overwrite = args.overwrite || config.batch.overwrite;

    options.validate().context("Invalid conversion options")?;
    Ok(options)
}

async fn convert(args: ConvertArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = config::load_config_or_default(config_path)?;
    let options = build_options(&args, &config)?;

    let encoder = FfmpegEncoder::new(config.encoder_config()?);
    let orchestrator = Orchestrator::new(Arc::new(encoder));

    let date = (config.batch.date_suffix && !args.no_date_suffix)
        .then(|| chrono::Local::now().date_naive());
    let output_dir = args.output_dir.clone().or(config.batch.output_dir.clone());

    let mut rejected = 0usize;
    for source in &args.files {
        if !is_video_file(source) {
            tracing::warn!("{:?} does not look like a video file", source);
        }

        let dir = match &output_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| ".".into()),
        };

        let Some(target) = output_path_for(source, &dir, options.container.extension(), date)
        else {
            eprintln!("Skipping {:?}: cannot derive an output name", source);
            rejected += 1;
            continue;
        };

        if let Err(e) = orchestrator.enqueue(source.clone(), target, options.clone()) {
            eprintln!("Skipping {:?}: {}", source, e);
            rejected += 1;
        }
    }

    if orchestrator.snapshot().jobs.is_empty() {
        anyhow::bail!("No files to convert");
    }

    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            cancel.cancel();
        }
    });

    let render = tokio::spawn(render_events(orchestrator.clone(), orchestrator.subscribe()));

    let concurrency = args.concurrency.unwrap_or(config.batch.concurrency);
    let result = orchestrator.run_batch(concurrency).await;

    // Every run ends with a finished or aborted event; let the renderer print up to it.
    if tokio::time::timeout(RENDER_DRAIN_TIMEOUT, render).await.is_err() {
        tracing::debug!("Progress display did not drain in time");
    }

    let snapshot = orchestrator.snapshot();

    let report = match result {
        Ok(report) => report,
        Err(BatchError::EncoderUnavailable(e)) => {
            eprintln!("Error: {}", e);
            eprintln!("Run `vidconv check-tools` to diagnose the ffmpeg installation.");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        let out = serde_json::json!({
            "report": report,
            "jobs": snapshot.jobs,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        for job in &snapshot.jobs {
            match job.status() {
                JobStatus::Succeeded => println!(
                    "✓ {} -> {} ({})",
                    job.source.display(),
                    job.target.display(),
                    format_file_size(job.output_bytes.unwrap_or(0))
                ),
                JobStatus::Failed => println!(
                    "✗ {}: {}",
                    job.source.display(),
                    job.error().map(|e| e.to_string()).unwrap_or_default()
                ),
                JobStatus::Pending | JobStatus::Running => {
                    println!("- {} (not started)", job.source.display())
                }
            }
        }
        print_report(&report);
    }

    if report.all_succeeded() && rejected == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_report(report: &BatchReport) {
    println!();
    println!(
        "{} of {} succeeded, {} failed, {} not started ({:.1}s){}",
        report.succeeded,
        report.total,
        report.failed,
        report.not_started,
        report.elapsed_secs,
        if report.cancelled { " - cancelled" } else { "" }
    );
}

/// Print per-job progress to stderr until the batch finishes or aborts.
async fn render_events(orchestrator: Orchestrator, mut rx: broadcast::Receiver<BatchEvent>) {
    let mut last_shown: HashMap<_, f32> = HashMap::new();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Progress display skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match &event {
            BatchEvent::JobStarted { id, source } => {
                last_shown.insert(*id, 0.0);
                eprintln!("Converting {}", source.display());
            }
            BatchEvent::JobProgress { id, progress, step } => {
                let last = last_shown.entry(*id).or_insert(0.0);
                if *progress - *last >= 10.0 {
                    *last = *progress;
                    let name = orchestrator
                        .job(*id)
                        .map(|j| j.file_name)
                        .unwrap_or_default();
                    eprintln!("  {} {:>5.1}% ({})", name, progress, step);
                }
            }
            BatchEvent::JobFailed { id, kind, error } => {
                last_shown.remove(id);
                eprintln!("  failed [{}]: {}", kind, error);
            }
            BatchEvent::JobSucceeded { id, output, .. } => {
                last_shown.remove(id);
                eprintln!("  wrote {}", output.display());
            }
            BatchEvent::BatchFinished { .. } | BatchEvent::BatchAborted { .. } => break,
            _ => {}
        }
    }
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<ExitCode> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let encoder = config.encoder_config()?;
    let media_info = probe_with_ffprobe(&encoder.ffprobe, file)
        .with_context(|| format!("Failed to probe {:?}", file))?;

    if json {
        let json_str = serde_json::to_string_pretty(&media_info)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", media_info.file_path.display());
        println!("Container: {}", media_info.container);
        println!("Size: {}", format_file_size(media_info.file_size));
        if let Some(duration) = media_info.duration {
            println!("Duration: {}", format_duration(duration));
        }
        if let Some(bit_rate) = media_info.bit_rate {
            println!("Bit rate: {} kb/s", bit_rate / 1000);
        }

        println!("\nVideo Tracks: {}", media_info.video_tracks.len());
        for track in &media_info.video_tracks {
            print!("  [{}] {} {}x{}", track.index, track.codec, track.width, track.height);
            if let Some(fps) = track.frame_rate {
                print!(", {:.3} fps", fps);
            }
            println!();
        }

        println!("\nAudio Tracks: {}", media_info.audio_tracks.len());
        for track in &media_info.audio_tracks {
            print!("  [{}] {} {}ch", track.index, track.codec, track.channels);
            if let Some(rate) = track.sample_rate {
                print!(", {} Hz", rate);
            }
            println!();
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn check_tools_cmd(config_path: Option<&Path>) -> Result<ExitCode> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let encoder = config.encoder_config()?;
    let tools = check_tools(&encoder.ffmpeg, &encoder.ffprobe);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
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
        Ok(ExitCode::SUCCESS)
    } else {
        println!("ffmpeg and ffprobe are required. Install them or set [encoder] paths in the config.");
        Ok(ExitCode::FAILURE)
    }
}

fn validate_config(path: Option<&Path>) -> Result<ExitCode> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Concurrency: {}", config.batch.concurrency);
            println!(
                "  Output dir: {}",
                config
                    .batch
                    .output_dir
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "next to source".to_string())
            );
            println!("  Date suffix: {}", config.batch.date_suffix);
            println!("  Default container: {}", config.defaults.container);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Concurrency: {}", config.batch.concurrency);
            println!("  Default container: {}", config.defaults.container);
        }
    }

    Ok(ExitCode::SUCCESS)
}
