//! Conversions through a real ffmpeg.
//!
//! Sources are synthesized with ffmpeg's lavfi inputs. Every test returns early
//! when ffmpeg or ffprobe is not installed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vidconv::batch::{JobStatus, Orchestrator};
use vidconv_av::{
    check_tool, no_progress, AudioMode, Container, ConversionOptions, EncodeRequest, Encoder,
    EncoderConfig, ErrorKind, FfmpegEncoder, FitMode, MediaInfo, Passes, Resize, SizeTarget,
    VideoCodec,
};
use vidconv_av::probe::probe_with_ffprobe;

fn tools_available() -> bool {
    let available = check_tool("ffmpeg").available && check_tool("ffprobe").available;
    if !available {
        eprintln!("Skipping test: ffmpeg/ffprobe not installed");
    }
    available
}

/// Render a two-second 320x240 clip with a sine tone.
fn make_source(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let status = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=2:size=320x240:rate=25",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:duration=2",
            "-c:v",
            "mpeg4",
            "-c:a",
            "pcm_s16le",
            "-shortest",
        ])
        .arg(&path)
        .status()
        .expect("failed to run ffmpeg");
    assert!(status.success(), "ffmpeg could not create test source");
    path
}

/// mpeg4 and aac ship with every ffmpeg build.
fn portable_mp4() -> ConversionOptions {
    let mut options = ConversionOptions::new(Container::Mp4);
    options.video_codec = Some(VideoCodec::Mpeg4);
    options.audio = Some(AudioMode::Aac);
    options
}

fn probe(path: &Path) -> vidconv_av::Result<MediaInfo> {
    probe_with_ffprobe(&EncoderConfig::discover().ffprobe, path)
}

fn encoder() -> FfmpegEncoder {
    FfmpegEncoder::new(EncoderConfig::discover())
}

fn leftover_staging(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(".vidconv-"))
                .unwrap_or(false)
        })
        .collect()
}

#[tokio::test]
async fn converts_avi_to_mp4() {
    if !tools_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let source = make_source(dir.path(), "clip.avi");
    let target = dir.path().join("clip.mp4");

    let request = EncodeRequest {
        source,
        target: target.clone(),
        options: portable_mp4(),
    };
    let outcome = encoder()
        .convert(&request, no_progress(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.output, target);
    assert!(outcome.bytes_written > 0);
    assert!(leftover_staging(dir.path()).is_empty());

    let info = probe(&target).unwrap();
    assert_eq!(info.video_tracks.len(), 1);
    assert!(info.has_audio());
    assert!(info.duration_secs().unwrap() > 1.5);
}

#[tokio::test]
async fn resize_pads_to_exact_frame() {
    if !tools_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let source = make_source(dir.path(), "wide.avi");
    let target = dir.path().join("small.mp4");

    let mut options = portable_mp4();
    options.resize = Some(Resize {
        width: 160,
        height: 90,
        fit: FitMode::Pad,
        allow_upscale: false,
    });

    let request = EncodeRequest {
        source,
        target: target.clone(),
        options,
    };
    encoder()
        .convert(&request, no_progress(), CancellationToken::new())
        .await
        .unwrap();

    let info = probe(&target).unwrap();
    let video = info.primary_video().unwrap();
    assert_eq!((video.width, video.height), (160, 90));
}

#[tokio::test]
async fn size_target_stays_near_budget() {
    if !tools_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let source = make_source(dir.path(), "clip.avi");
    let target = dir.path().join("budget.mp4");

    let mut options = portable_mp4();
    options.size_target = Some(SizeTarget {
        megabytes: 0.25,
        passes: Passes::Single,
    });

    let request = EncodeRequest {
        source,
        target: target.clone(),
        options,
    };
    let outcome = encoder()
        .convert(&request, no_progress(), CancellationToken::new())
        .await
        .unwrap();

    // Single-pass rate control overshoots a little; allow 50%.
    assert!(
        outcome.bytes_written < 384 * 1024,
        "output was {} bytes",
        outcome.bytes_written
    );
}

#[tokio::test]
async fn progress_reaches_completion() {
    if !tools_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let source = make_source(dir.path(), "clip.avi");

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let progress: vidconv_av::ProgressCallback = {
        let seen = Arc::clone(&seen);
        Arc::new(move |percent: f32, _step: &str| seen.lock().push(percent))
    };

    let request = EncodeRequest {
        source,
        target: dir.path().join("clip.mp4"),
        options: portable_mp4(),
    };
    encoder()
        .convert(&request, progress, CancellationToken::new())
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.last().copied(), Some(100.0));
    assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
}

#[tokio::test]
async fn corrupt_source_fails_through_orchestrator() {
    if !tools_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken.avi");
    std::fs::write(&broken, b"this is not a video file at all").unwrap();
    let good = make_source(dir.path(), "good.avi");

    let orchestrator = Orchestrator::new(Arc::new(encoder()));
    let broken_id = orchestrator
        .enqueue(&broken, dir.path().join("broken.mp4"), portable_mp4())
        .unwrap();
    let good_id = orchestrator
        .enqueue(&good, dir.path().join("good.mp4"), portable_mp4())
        .unwrap();

    let report = orchestrator.run_batch(1).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let broken_job = orchestrator.job(broken_id).unwrap();
    assert_eq!(broken_job.status(), JobStatus::Failed);
    assert_eq!(broken_job.error().map(|e| e.kind), Some(ErrorKind::Input));
    assert!(!dir.path().join("broken.mp4").exists());

    assert_eq!(
        orchestrator.job(good_id).unwrap().status(),
        JobStatus::Succeeded
    );
    assert!(leftover_staging(dir.path()).is_empty());
}
