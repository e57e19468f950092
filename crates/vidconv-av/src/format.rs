//! Output containers, video codecs, and audio handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// MPEG-4 Part 14 container
    Mp4,
    /// QuickTime container
    Mov,
    /// AVI container
    Avi,
    /// WebM container
    Webm,
}

impl Container {
    /// All supported containers.
    pub const ALL: [Container; 4] = [Container::Mp4, Container::Mov, Container::Avi, Container::Webm];

    /// Get the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mov => "mov",
            Container::Avi => "avi",
            Container::Webm => "webm",
        }
    }

    /// Get the ffmpeg muxer name (`-f`).
    pub fn ffmpeg_format_name(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mov => "mov",
            Container::Avi => "avi",
            Container::Webm => "webm",
        }
    }

    /// Video codec used when none is requested or re-encoding is forced.
    pub fn default_video_codec(&self) -> VideoCodec {
        match self {
            Container::Mp4 | Container::Mov => VideoCodec::H264,
            Container::Avi => VideoCodec::Mpeg4,
            Container::Webm => VideoCodec::Vp9,
        }
    }

    /// Encoded audio used when none is requested or copying is not possible.
    pub fn default_audio(&self) -> AudioMode {
        match self {
            Container::Mp4 | Container::Mov | Container::Avi => AudioMode::Aac,
            Container::Webm => AudioMode::Opus,
        }
    }

    /// Whether the container can carry this video codec.
    ///
    /// Stream copy is always allowed; the muxer decides at run time.
    pub fn supports_video(&self, codec: VideoCodec) -> bool {
        use VideoCodec::*;
        match self {
            Container::Mp4 => matches!(codec, Copy | H264 | H265 | Vp9 | Av1 | Mpeg4),
            Container::Mov => matches!(codec, Copy | H264 | H265 | Mpeg4),
            Container::Avi => matches!(codec, Copy | H264 | Mpeg4),
            Container::Webm => matches!(codec, Copy | Vp9 | Av1),
        }
    }

    /// Whether the container can carry this audio handling.
    pub fn supports_audio(&self, audio: AudioMode) -> bool {
        use AudioMode::*;
        match self {
            Container::Mp4 => matches!(audio, Copy | Aac | Mp3 | Opus | None),
            Container::Mov | Container::Avi => matches!(audio, Copy | Aac | Mp3 | None),
            Container::Webm => matches!(audio, Copy | Opus | None),
        }
    }

    /// Whether a source audio stream (by ffprobe codec name) can be stream-copied.
    pub fn can_copy_audio(&self, codec: &str) -> bool {
        match self {
            Container::Webm => matches!(codec, "opus" | "vorbis"),
            _ => true,
        }
    }

    /// Whether the muxer benefits from moving the index to the front.
    pub fn supports_faststart(&self) -> bool {
        matches!(self, Container::Mp4 | Container::Mov)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for Container {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches('.') {
            "mp4" | "m4v" => Ok(Container::Mp4),
            "mov" | "quicktime" => Ok(Container::Mov),
            "avi" => Ok(Container::Avi),
            "webm" => Ok(Container::Webm),
            _ => Err(format!(
                "Unknown container format: {} (expected mp4, mov, avi or webm)",
                s
            )),
        }
    }
}

/// Video codec choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// Copy the video stream without re-encoding
    Copy,
    /// H.264 / AVC via libx264
    H264,
    /// H.265 / HEVC via libx265
    H265,
    /// VP9 via libvpx-vp9
    Vp9,
    /// AV1 via libaom-av1
    Av1,
    /// MPEG-4 Part 2 via ffmpeg's native encoder
    Mpeg4,
}

impl VideoCodec {
    /// Get the ffmpeg encoder name (`-c:v`).
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            VideoCodec::Copy => "copy",
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::Av1 => "libaom-av1",
            VideoCodec::Mpeg4 => "mpeg4",
        }
    }

    /// Whether this codec re-encodes (anything but copy).
    pub fn is_encoding(&self) -> bool {
        !matches!(self, VideoCodec::Copy)
    }

    /// Highest CRF value the encoder accepts.
    pub fn max_crf(&self) -> u8 {
        match self {
            VideoCodec::H264 | VideoCodec::H265 => 51,
            VideoCodec::Vp9 | VideoCodec::Av1 => 63,
            // mpeg4 maps CRF onto qscale; copy ignores it
            VideoCodec::Mpeg4 | VideoCodec::Copy => 63,
        }
    }

    /// Whether the ffmpeg wrapper honours `-pass 1/2`.
    pub fn supports_two_pass(&self) -> bool {
        matches!(
            self,
            VideoCodec::H264 | VideoCodec::Vp9 | VideoCodec::Av1 | VideoCodec::Mpeg4
        )
    }

    /// Whether `-preset` applies.
    pub fn supports_preset(&self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H265)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VideoCodec::Copy => "copy",
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
            VideoCodec::Vp9 => "vp9",
            VideoCodec::Av1 => "av1",
            VideoCodec::Mpeg4 => "mpeg4",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(VideoCodec::Copy),
            "h264" | "avc" | "x264" | "libx264" => Ok(VideoCodec::H264),
            "h265" | "hevc" | "x265" | "libx265" => Ok(VideoCodec::H265),
            "vp9" | "libvpx-vp9" => Ok(VideoCodec::Vp9),
            "av1" | "libaom-av1" => Ok(VideoCodec::Av1),
            "mpeg4" | "xvid" => Ok(VideoCodec::Mpeg4),
            _ => Err(format!("Unknown video codec: {}", s)),
        }
    }
}

/// How the audio stream is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    /// Keep the source audio stream as-is
    Copy,
    /// AAC at 192 kbit/s
    Aac,
    /// MP3 at 192 kbit/s
    Mp3,
    /// Opus at 128 kbit/s
    Opus,
    /// Drop audio entirely
    None,
}

impl AudioMode {
    /// ffmpeg arguments for this audio handling.
    pub fn ffmpeg_args(&self) -> &'static [&'static str] {
        match self {
            AudioMode::Copy => &["-c:a", "copy"],
            AudioMode::Aac => &["-c:a", "aac", "-b:a", "192k"],
            AudioMode::Mp3 => &["-c:a", "libmp3lame", "-b:a", "192k"],
            AudioMode::Opus => &["-c:a", "libopus", "-b:a", "128k"],
            AudioMode::None => &["-an"],
        }
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AudioMode::Copy => "copy",
            AudioMode::Aac => "aac",
            AudioMode::Mp3 => "mp3",
            AudioMode::Opus => "opus",
            AudioMode::None => "none",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AudioMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(AudioMode::Copy),
            "aac" => Ok(AudioMode::Aac),
            "mp3" => Ok(AudioMode::Mp3),
            "opus" => Ok(AudioMode::Opus),
            "none" | "remove" | "mute" => Ok(AudioMode::None),
            _ => Err(format!("Unknown audio mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_from_str() {
        assert_eq!("mp4".parse::<Container>().ok(), Some(Container::Mp4));
        assert_eq!("MOV".parse::<Container>().ok(), Some(Container::Mov));
        assert_eq!(".webm".parse::<Container>().ok(), Some(Container::Webm));
        assert_eq!("quicktime".parse::<Container>().ok(), Some(Container::Mov));
        assert_eq!("mkv".parse::<Container>().ok(), None);
    }

    #[test]
    fn test_container_defaults_are_supported() {
        for container in Container::ALL {
            assert!(container.supports_video(container.default_video_codec()));
            assert!(container.supports_audio(container.default_audio()));
        }
    }

    #[test]
    fn test_webm_rejects_h264_and_aac() {
        assert!(!Container::Webm.supports_video(VideoCodec::H264));
        assert!(!Container::Webm.supports_audio(AudioMode::Aac));
        assert!(Container::Webm.supports_audio(AudioMode::Opus));
    }

    #[test]
    fn test_encoded_audio_fallback() {
        assert_eq!(Container::Avi.default_audio(), AudioMode::Aac);
        assert_eq!(Container::Webm.default_audio(), AudioMode::Opus);
    }

    #[test]
    fn test_webm_copies_only_opus_or_vorbis() {
        assert!(Container::Webm.can_copy_audio("opus"));
        assert!(!Container::Webm.can_copy_audio("aac"));
        assert!(Container::Mp4.can_copy_audio("aac"));
    }

    #[test]
    fn test_avi_rejects_modern_codecs() {
        assert!(!Container::Avi.supports_video(VideoCodec::Vp9));
        assert!(!Container::Avi.supports_video(VideoCodec::Av1));
        assert!(Container::Avi.supports_video(VideoCodec::Mpeg4));
    }

    #[test]
    fn test_video_codec_aliases() {
        assert_eq!("hevc".parse::<VideoCodec>().ok(), Some(VideoCodec::H265));
        assert_eq!("AVC".parse::<VideoCodec>().ok(), Some(VideoCodec::H264));
        assert_eq!(VideoCodec::Vp9.ffmpeg_encoder(), "libvpx-vp9");
        assert!(!VideoCodec::Copy.is_encoding());
    }

    #[test]
    fn test_audio_mode_args() {
        assert_eq!(AudioMode::None.ffmpeg_args(), &["-an"]);
        assert_eq!("remove".parse::<AudioMode>().ok(), Some(AudioMode::None));
        assert_eq!(AudioMode::Mp3.ffmpeg_args()[1], "libmp3lame");
    }
}
