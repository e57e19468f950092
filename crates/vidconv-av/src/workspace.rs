//! Staging workspace for a single conversion.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Staging area for one conversion.
///
/// The encoder writes into a temporary directory created next to the target,
/// so the final move is a same-filesystem rename. Dropping the workspace
/// without calling [`Workspace::finalize`] removes everything it staged,
/// leaving no partial target on disk.
///
/// # Example
///
/// ```no_run
/// use vidconv_av::Workspace;
///
/// let workspace = Workspace::new("/videos/out/clip.mp4")?;
/// // ffmpeg writes to workspace.staging()
/// workspace.finalize(false)?;
/// # Ok::<(), vidconv_av::Error>(())
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    target_path: PathBuf,
    staging_path: PathBuf,
}

impl Workspace {
    /// Create a workspace for writing `target`.
    ///
    /// Fails with an output error when the target directory is missing or
    /// not writable.
    pub fn new<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref();

        let file_name = target
            .file_name()
            .ok_or_else(|| Error::output(target, "target path has no file name"))?;

        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        if !parent.is_dir() {
            return Err(Error::output(target, "output directory does not exist"));
        }

        let temp_dir = tempfile::Builder::new()
            .prefix(".vidconv-")
            .tempdir_in(parent)
            .map_err(|e| Error::output(target, format!("output directory not writable: {}", e)))?;

        let staging_path = temp_dir.path().join(file_name);

        Ok(Self {
            temp_dir,
            target_path: target.to_path_buf(),
            staging_path,
        })
    }

    /// Get the final target path.
    pub fn target(&self) -> &Path {
        &self.target_path
    }

    /// Get the path the encoder should write to.
    pub fn staging(&self) -> &Path {
        &self.staging_path
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a temp file path with the given name.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Move the staged output into place.
    ///
    /// An existing target is only replaced when `overwrite` is set. The old
    /// file is parked inside the temp directory first and restored if the
    /// final rename fails.
    pub fn finalize(self, overwrite: bool) -> Result<PathBuf> {
        let staged_len = std::fs::metadata(&self.staging_path)
            .map(|m| m.len())
            .map_err(|_| Error::encoding("ffmpeg", "encoder produced no output file"))?;

        if staged_len == 0 {
            return Err(Error::encoding("ffmpeg", "encoder produced an empty output file"));
        }

        let dest = &self.target_path;

        if dest.exists() {
            if !dest.is_file() {
                return Err(Error::output(dest, "target is not a regular file"));
            }
            if !overwrite {
                return Err(Error::output(dest, "target already exists"));
            }

            let backup = self.temp_dir.path().join(".previous");
            std::fs::rename(dest, &backup).map_err(|e| {
                Error::output(dest, format!("failed to move existing target aside: {}", e))
            })?;

            if let Err(e) = std::fs::rename(&self.staging_path, dest) {
                let _ = std::fs::rename(&backup, dest);
                return Err(Error::output(
                    dest,
                    format!("failed to move output into place: {}", e),
                ));
            }
        } else {
            std::fs::rename(&self.staging_path, dest).map_err(|e| {
                Error::output(dest, format!("failed to move output into place: {}", e))
            })?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Finalized {:?} ({} bytes)", dest, staged_len);

        Ok(dest.clone())
    }

    /// Clean up without finalizing (discard output).
    pub fn cleanup(self) {
        drop(self.temp_dir);
    }
}
