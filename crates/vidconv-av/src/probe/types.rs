//! Media information types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Information about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path to the media file.
    pub file_path: PathBuf,
    /// File size in bytes.
    pub file_size: u64,
    /// Container format as reported by ffprobe (e.g., "mov,mp4,m4a,3gp,3g2,mj2").
    pub container: String,
    /// Duration of the media.
    pub duration: Option<Duration>,
    /// Overall bit rate in bits per second.
    pub bit_rate: Option<u64>,
    /// Video tracks in the file.
    pub video_tracks: Vec<VideoTrack>,
    /// Audio tracks in the file.
    pub audio_tracks: Vec<AudioTrack>,
}

/// Information about a video track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTrack {
    /// Track index among video tracks.
    pub index: u32,
    /// Video codec (e.g., "h264", "vp9").
    pub codec: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate in FPS.
    pub frame_rate: Option<f64>,
}

/// Information about an audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Track index among audio tracks.
    pub index: u32,
    /// Audio codec (e.g., "aac", "opus").
    pub codec: String,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
}

impl MediaInfo {
    /// Get the primary (first) video track.
    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }

    /// Get the primary (first) audio track.
    pub fn primary_audio(&self) -> Option<&AudioTrack> {
        self.audio_tracks.first()
    }

    /// Whether the file carries at least one audio track.
    pub fn has_audio(&self) -> bool {
        !self.audio_tracks.is_empty()
    }

    /// Duration in seconds, if known and positive.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration
            .map(|d| d.as_secs_f64())
            .filter(|secs| *secs > 0.0)
    }

    /// Resolution of the primary video track as `WIDTHxHEIGHT`.
    pub fn resolution(&self) -> Option<String> {
        self.primary_video()
            .map(|v| format!("{}x{}", v.width, v.height))
    }
}

/// Format a byte count for display (`B`, `KB`, `MB`, `GB`, `TB`).
///
/// # Example
///
/// ```
/// use vidconv_av::probe::format_file_size;
///
/// assert_eq!(format_file_size(512), "512.00 B");
/// assert_eq!(format_file_size(1536), "1.50 KB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} TB", size)
}

/// Format a duration as `HH:MM:SS`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> MediaInfo {
        MediaInfo {
            file_path: PathBuf::from("/videos/a.mov"),
            file_size: 10 * 1024 * 1024,
            container: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration: Some(Duration::from_secs_f64(12.5)),
            bit_rate: Some(6_700_000),
            video_tracks: vec![VideoTrack {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                frame_rate: Some(29.97),
            }],
            audio_tracks: vec![],
        }
    }

    #[test]
    fn test_media_info_helpers() {
        let info = sample_info();
        assert_eq!(info.resolution().as_deref(), Some("1920x1080"));
        assert!(!info.has_audio());
        assert_eq!(info.duration_secs(), Some(12.5));
    }

    #[test]
    fn test_zero_duration_is_unknown() {
        let mut info = sample_info();
        info.duration = Some(Duration::ZERO);
        assert_eq!(info.duration_secs(), None);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0.00 B");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_file_size(2 * 1024u64.pow(4)), "2.00 TB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_duration(Duration::from_secs_f64(59.9)), "00:00:59");
    }
}
