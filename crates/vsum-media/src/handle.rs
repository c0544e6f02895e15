//! Handles to locally acquired media.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::MediaResult;

/// Reference to media bytes stored inside a job's working area.
///
/// A handle is exclusively owned by the job that acquired it and is deleted
/// at most once.
#[derive(Debug)]
pub struct MediaHandle {
    path: PathBuf,
    size_bytes: u64,
    released: AtomicBool,
}

impl MediaHandle {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            released: AtomicBool::new(false),
        }
    }

    /// Build a handle for an existing file, reading its size.
    pub async fn from_file(path: impl Into<PathBuf>) -> MediaResult<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        Ok(Self::new(path, metadata.len()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Whether a release has been requested.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Delete the media file.
    ///
    /// Returns `Ok(true)` when this call performed the deletion and
    /// `Ok(false)` when the handle had already been released. A file that is
    /// already gone is treated as deleted.
    pub async fn release(&self) -> MediaResult<bool> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Deleted media file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}
