//! Error types for vidconv-av.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing or converting a file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source file is missing, unreadable, or not a detectable video.
    #[error("input error: {}: {message}", path.display())]
    Input { path: PathBuf, message: String },

    /// The target path cannot be written.
    #[error("output error: {}: {message}", path.display())]
    Output { path: PathBuf, message: String },

    /// The external encoder ran and failed.
    #[error("encoding failed: {tool}: {message}")]
    Encoding { tool: String, message: String },

    /// The conversion was aborted by a cancellation request.
    #[error("conversion cancelled")]
    Cancelled,

    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// The requested options cannot be satisfied.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`], recorded on failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Output,
    Encoding,
    Cancelled,
    ToolNotFound,
    InvalidOptions,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Input => "input",
            ErrorKind::Output => "output",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ToolNotFound => "tool_not_found",
            ErrorKind::InvalidOptions => "invalid_options",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Create an input error.
    pub fn input(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Input {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create an output error.
    pub fn output(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Output {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encoding {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Input { .. } | Error::ParseError { .. } | Error::Json(_) => ErrorKind::Input,
            Error::Output { .. } => ErrorKind::Output,
            Error::Encoding { .. } | Error::Io(_) => ErrorKind::Encoding,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Error::InvalidOptions(_) => ErrorKind::InvalidOptions,
        }
    }

    /// Whether this error means no further conversion can succeed.
    ///
    /// Only a missing encoder binary is fatal; everything else is scoped to a
    /// single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ToolNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(Error::input("/a.mov", "missing").kind(), ErrorKind::Input);
        assert_eq!(Error::output("/b.mp4", "exists").kind(), ErrorKind::Output);
        assert_eq!(Error::encoding("ffmpeg", "boom").kind(), ErrorKind::Encoding);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(Error::parse_error("ffprobe", "bad").kind(), ErrorKind::Input);
        assert_eq!(
            Error::Io(std::io::Error::other("disk")).kind(),
            ErrorKind::Encoding
        );
    }

    #[test]
    fn test_only_tool_not_found_is_fatal() {
        assert!(Error::tool_not_found("ffmpeg").is_fatal());
        assert!(!Error::encoding("ffmpeg", "exit 1").is_fatal());
        assert!(!Error::Cancelled.is_fatal());
    }

    #[test]
    fn test_display_includes_path() {
        let err = Error::input("/videos/broken.avi", "unreadable");
        assert_eq!(err.to_string(), "input error: /videos/broken.avi: unreadable");
    }
}
