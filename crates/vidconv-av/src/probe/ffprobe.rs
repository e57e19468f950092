//! FFprobe-based media probing.

use super::types::*;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

/// Probe a media file using the given ffprobe binary.
///
/// A non-zero ffprobe exit means the file could not be read as media and is
/// reported as an input error.
pub fn probe_with_ffprobe(ffprobe: &Path, path: &Path) -> Result<MediaInfo> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(ffprobe.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            "unsupported or undetectable format".to_string()
        } else {
            format!("unsupported or undetectable format: {}", stderr.trim())
        };
        return Err(Error::input(path, message));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

    parse_ffprobe_json(path, &json_str)
}

/// Parse the JSON document printed by `ffprobe -show_format -show_streams`.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse_error("ffprobe", e.to_string()))?;

    let format = output
        .format
        .ok_or_else(|| Error::input(path, "unsupported or undetectable format"))?;

    let duration = format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    let mut info = MediaInfo {
        file_path: path.to_path_buf(),
        file_size: format.size.and_then(|s| s.parse().ok()).unwrap_or(0),
        container: format.format_name,
        duration,
        bit_rate: format.bit_rate.and_then(|s| s.parse().ok()),
        video_tracks: Vec::new(),
        audio_tracks: Vec::new(),
    };

    let mut video_index = 0u32;
    let mut audio_index = 0u32;

    for stream in output.streams {
        match stream.codec_type.as_str() {
            "video" => {
                info.video_tracks.push(VideoTrack {
                    index: video_index,
                    codec: stream.codec_name.unwrap_or_default(),
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate: stream.r_frame_rate.and_then(|s| parse_frame_rate(&s)),
                });
                video_index += 1;
            }
            "audio" => {
                info.audio_tracks.push(AudioTrack {
                    index: audio_index,
                    codec: stream.codec_name.unwrap_or_default(),
                    channels: stream.channels.unwrap_or(2),
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                });
                audio_index += 1;
            }
            _ => {}
        }
    }

    Ok(info)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok()
}
