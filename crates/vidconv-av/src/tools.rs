//! External tool detection.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available and get its information.
///
/// ffmpeg and ffprobe take `-version` rather than `--version`.
///
/// # Example
///
/// ```no_run
/// use vidconv_av::check_tool;
///
/// let info = check_tool("ffprobe");
/// if info.available {
///     println!("ffprobe version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(program: impl AsRef<Path>) -> ToolInfo {
    check_tool_with_arg(program, "-version")
}

/// Check if a tool is available using a custom version argument.
pub fn check_tool_with_arg(program: impl AsRef<Path>, version_arg: &str) -> ToolInfo {
    let program = program.as_ref();
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string());

    match Command::new(program).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            let path = if program.components().count() > 1 {
                Some(program.to_path_buf())
            } else {
                which::which(program).ok()
            };

            ToolInfo {
                name,
                available: true,
                version,
                path,
            }
        }
        _ => ToolInfo {
            name,
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check the tools a conversion needs.
pub fn check_tools(ffmpeg: &Path, ffprobe: &Path) -> Vec<ToolInfo> {
    vec![check_tool(ffmpeg), check_tool(ffprobe)]
}

/// Require that a tool is on PATH, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::tool_not_found(path.display().to_string()));
    }

    require_tool(name)
}
