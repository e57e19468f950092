//! Path utilities for video inputs and conversion outputs.
//!
//! Extension checks are used by the CLI to filter what gets enqueued, and the
//! naming helpers decide where a converted file lands.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// List of video file extensions accepted as conversion sources.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "webm", "mkv", "wmv", "flv", "mpg", "mpeg", "ts",
];

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vidconv_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.mov")));
/// assert!(is_video_file(Path::new("/path/to/video.WEBM")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build the output file name for a source file.
///
/// The name is `<stem>.<extension>`, or `<stem>_<YYYY-MM-DD>.<extension>` when a
/// date is given. Returns `None` if the source has no file stem.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use std::path::Path;
/// use vidconv_common::paths::output_file_name;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9);
/// assert_eq!(
///     output_file_name(Path::new("/in/holiday.mov"), "mp4", date).as_deref(),
///     Some("holiday_2024-03-09.mp4")
/// );
/// assert_eq!(
///     output_file_name(Path::new("holiday.mov"), "mp4", None).as_deref(),
///     Some("holiday.mp4")
/// );
/// ```
pub fn output_file_name(source: &Path, extension: &str, date: Option<NaiveDate>) -> Option<String> {
    let stem = source.file_stem()?.to_string_lossy();
    if stem.is_empty() {
        return None;
    }

    Some(match date {
        Some(date) => format!("{}_{}.{}", stem, date.format("%Y-%m-%d"), extension),
        None => format!("{}.{}", stem, extension),
    })
}

/// Build the full output path for a source file inside `output_dir`.
pub fn output_path_for(
    source: &Path,
    output_dir: &Path,
    extension: &str,
    date: Option<NaiveDate>,
) -> Option<PathBuf> {
    output_file_name(source, extension, date).map(|name| output_dir.join(name))
}

/// Normalize a path for comparison.
///
/// The parent directory is canonicalized when it exists so that `./a.mp4` and
/// `/abs/dir/a.mp4` compare equal. The file itself need not exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };

    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    match parent.canonicalize() {
        Ok(parent) => parent.join(name),
        Err(_) => path.to_path_buf(),
    }
}

/// Check whether two paths refer to the same file location.
pub fn is_same_path(a: &Path, b: &Path) -> bool {
    normalize_path(a) == normalize_path(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("movie.mp4")));
        assert!(is_video_file(Path::new("movie.mov")));
        assert!(is_video_file(Path::new("movie.avi")));
        assert!(is_video_file(Path::new("movie.webm")));
        assert!(is_video_file(Path::new("movie.mkv")));

        // Case insensitive
        assert!(is_video_file(Path::new("movie.MOV")));
        assert!(is_video_file(Path::new("movie.Mp4")));

        assert!(!is_video_file(Path::new("subtitle.srt")));
        assert!(!is_video_file(Path::new("no_extension")));
        assert!(!is_video_file(Path::new("")));
    }

    #[test]
    fn test_output_file_name_multiple_dots() {
        assert_eq!(
            output_file_name(Path::new("trip.day1.avi"), "webm", None).as_deref(),
            Some("trip.day1.webm")
        );
    }

    #[test]
    fn test_output_file_name_no_stem() {
        assert_eq!(output_file_name(Path::new("/"), "mp4", None), None);
    }

    #[test]
    fn test_output_path_for() {
        let path = output_path_for(Path::new("/src/a.mov"), Path::new("/out"), "mp4", None);
        assert_eq!(path, Some(PathBuf::from("/out/a.mp4")));
    }

    #[test]
    fn test_is_same_path_relative_and_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mov");
        std::fs::write(&file, b"x").unwrap();

        let dotted = dir.path().join(".").join("clip.mov");
        assert!(is_same_path(&file, &dotted));
        assert!(!is_same_path(&file, &dir.path().join("clip.mp4")));
    }

    #[test]
    fn test_is_same_path_missing_parent() {
        let a = Path::new("/does/not/exist/a.mp4");
        assert!(is_same_path(a, a));
        assert!(!is_same_path(a, Path::new("/does/not/exist/b.mp4")));
    }
}
