//! Per-run workspace for transient files.
//!
//! A [`Workspace`] is a uniquely named temporary directory owned by exactly one
//! run. Every transient resource a run creates (raw asset, watermarked asset,
//! segments, ciphertexts) lives inside it, and the directory is removed when
//! the workspace is dropped, on success, error and unwinding alike.
//!
//! [`TransientFile`] releases a single file early, so large intermediates do
//! not linger until the end of the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;

use crate::ids::VideoId;
use crate::{Error, Result};

/// Temporary directory namespace for one run.
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    video_id: VideoId,
    counter: AtomicU64,
}

impl Workspace {
    /// Create a fresh workspace for `video_id` under `root`.
    ///
    /// The directory name carries the video ID plus a random suffix, so two
    /// runs for the same video never share a namespace.
    pub fn create(root: &Path, video_id: &VideoId) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("vidlock-{video_id}-"))
            .tempdir_in(root)
            .map_err(|e| {
                Error::Internal(format!(
                    "failed to create workspace in {}: {e}",
                    root.display()
                ))
            })?;

        tracing::debug!(video_id = %video_id, dir = %temp_dir.path().display(), "Workspace created");

        Ok(Self {
            temp_dir,
            video_id: video_id.clone(),
            counter: AtomicU64::new(0),
        })
    }

    /// The video this workspace belongs to.
    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    /// Path to the workspace directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A path for a named file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// A never-before-returned file path `<stem>_<n>.<ext>` inside the workspace.
    pub fn unique_file(&self, stem: &str, ext: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.temp_dir.path().join(format!("{stem}_{n}.{ext}"))
    }

    /// Remove the workspace now, reporting failures instead of ignoring them.
    pub fn close(self) -> Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close().map_err(|e| {
            Error::Internal(format!(
                "failed to remove workspace {}: {e}",
                path.display()
            ))
        })
    }
}

/// Guard that deletes one file when dropped.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
}

impl TransientFile {
    /// Take ownership of the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove transient file");
            }
        }
    }
}
