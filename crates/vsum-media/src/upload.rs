//! Uploaded media files.
//!
//! An upload is written to a staging directory while the request body
//! arrives ([`UploadWriter`]). The resulting [`StagedUpload`] deletes its file
//! on drop unless it is handed to a job with [`StagedUpload::keep`]. The job
//! later moves the file into its working area through [`UploadSource`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};
use crate::handle::MediaHandle;

/// Unique staging file name that keeps the uploaded file's extension.
///
/// The extension is kept only when it is short and ASCII alphanumeric.
pub fn staged_file_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    match ext {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// Streams an upload into the staging directory, enforcing a size limit.
#[derive(Debug)]
pub struct UploadWriter {
    file: fs::File,
    staged: StagedUpload,
    limit: u64,
}

impl UploadWriter {
    /// Create a new staging file for an upload named `original_name`.
    pub async fn create(staging_dir: &Path, original_name: &str, limit: u64) -> MediaResult<Self> {
        fs::create_dir_all(staging_dir).await?;

        let path = staging_dir.join(staged_file_name(original_name));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        debug!(path = %path.display(), original = %original_name, "Staging upload");

        Ok(Self {
            file,
            staged: StagedUpload {
                path,
                size_bytes: 0,
                kept: false,
            },
            limit,
        })
    }

    /// Append a chunk of the upload body.
    ///
    /// Fails with [`MediaError::UploadTooLarge`] once the limit is passed;
    /// the partial file is removed when the writer is dropped.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> MediaResult<()> {
        let size = self.staged.size_bytes + chunk.len() as u64;
        if size > self.limit {
            return Err(MediaError::UploadTooLarge(self.limit));
        }
        self.file.write_all(chunk).await?;
        self.staged.size_bytes = size;
        Ok(())
    }

    /// Flush the file and return the staged upload.
    pub async fn finish(mut self) -> MediaResult<StagedUpload> {
        if self.staged.size_bytes == 0 {
            return Err(MediaError::EmptyUpload);
        }
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.staged)
    }
}

/// A fully written upload waiting to be picked up by a job.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    size_bytes: u64,
    kept: bool,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Source reference a job uses to find this upload.
    pub fn source_ref(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Leave the file in place; the job that received it now owns it.
    pub fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed unclaimed upload"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove unclaimed upload"),
        }
    }
}

/// Hands staged uploads over to jobs.
///
/// Only files directly inside the staging directory are accepted, so a
/// source reference can never point a job at arbitrary local paths.
#[derive(Debug, Clone)]
pub struct UploadSource {
    staging_dir: PathBuf,
}

impl UploadSource {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    fn staged_path(&self, source_ref: &str) -> MediaResult<PathBuf> {
        let path = PathBuf::from(source_ref);
        let file_name = path
            .file_name()
            .filter(|_| path.parent() == Some(self.staging_dir.as_path()))
            .ok_or_else(|| MediaError::invalid_source("Upload is not in the staging area"))?;
        Ok(self.staging_dir.join(file_name))
    }

    /// Move the staged upload into `dest_dir` and return a handle to it.
    pub async fn accept(&self, source_ref: &str, dest_dir: &Path) -> MediaResult<MediaHandle> {
        let src = self.staged_path(source_ref)?;
        let file_name = src
            .file_name()
            .ok_or_else(|| MediaError::invalid_source("Upload has no file name"))?;
        let dst = dest_dir.join(file_name);

        move_file(&src, &dst).await?;
        debug!(from = %src.display(), to = %dst.display(), "Upload moved into working area");

        MediaHandle::from_file(dst).await
    }

    /// Delete a staged upload that no job will accept.
    ///
    /// Returns `Ok(false)` when the file was already gone.
    pub async fn discard(&self, source_ref: &str) -> MediaResult<bool> {
        let path = self.staged_path(source_ref)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Discarded staged upload");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Rename `src` to `dst`, copying across filesystems when needed.
async fn move_file(src: &Path, dst: &Path) -> MediaResult<()> {
    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(MediaError::invalid_source("Uploaded file is no longer available"))
        }
        // EXDEV
        Err(e) if e.raw_os_error() == Some(18) => {
            debug!(
                "Cross-device rename, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            fs::copy(src, dst).await?;
            if let Err(e) = fs::remove_file(src).await {
                warn!(path = %src.display(), error = %e, "Failed to remove staged upload after copy");
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn stage(dir: &Path, name: &str, body: &[u8]) -> StagedUpload {
        let mut writer = UploadWriter::create(dir, name, 1024).await.unwrap();
        writer.write_chunk(body).await.unwrap();
        writer.finish().await.unwrap()
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_staged_file_name_keeps_safe_extension() {
        assert!(staged_file_name("talk.MP4").ends_with(".mp4"));
        assert!(!staged_file_name("no-extension").contains('.'));
        assert!(!staged_file_name("weird.m/4").contains('/'));
        assert!(!staged_file_name("../../etc/passwd").contains(".."));
        assert_ne!(staged_file_name("a.mp3"), staged_file_name("a.mp3"));
    }

    #[tokio::test]
    async fn test_writer_stages_file() {
        let dir = TempDir::new().unwrap();
        let staged = stage(dir.path(), "clip.webm", b"video bytes").await;

        assert_eq!(staged.size_bytes(), 11);
        assert_eq!(staged.path().parent(), Some(dir.path()));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn test_writer_enforces_limit() {
        let dir = TempDir::new().unwrap();
        let mut writer = UploadWriter::create(dir.path(), "big.mp4", 8).await.unwrap();

        writer.write_chunk(b"12345").await.unwrap();
        let err = writer.write_chunk(b"6789").await.unwrap_err();
        assert!(matches!(err, MediaError::UploadTooLarge(8)));

        drop(writer);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let writer = UploadWriter::create(dir.path(), "empty.mp4", 8).await.unwrap();

        assert!(matches!(writer.finish().await, Err(MediaError::EmptyUpload)));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_unclaimed_upload_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let staged = stage(dir.path(), "a.mp3", b"audio").await;
        let path = staged.path().to_path_buf();

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_kept_upload_survives_drop() {
        let dir = TempDir::new().unwrap();
        let staged = stage(dir.path(), "a.mp3", b"audio").await;
        let path = staged.path().to_path_buf();

        staged.keep();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_accept_moves_upload_into_working_area() {
        let staging = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let source = UploadSource::new(staging.path());
        let staged = stage(staging.path(), "talk.mp4", b"video bytes").await;
        let source_ref = staged.source_ref();
        staged.keep();

        let media = source.accept(&source_ref, work.path()).await.unwrap();

        assert_eq!(media.path().parent(), Some(work.path()));
        assert_eq!(media.size_bytes(), 11);
        assert_eq!(file_count(staging.path()), 0);
        assert!(!source.discard(&source_ref).await.unwrap());
    }

    #[tokio::test]
    async fn test_paths_outside_staging_are_refused() {
        let staging = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let secret = elsewhere.path().join("secret.txt");
        std::fs::write(&secret, b"keep out").unwrap();
        let source = UploadSource::new(staging.path());
        let source_ref = secret.to_string_lossy().into_owned();

        let err = source.accept(&source_ref, staging.path()).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidSource(_)));
        assert!(source.discard(&source_ref).await.is_err());
        assert!(source.discard("../secret.txt").await.is_err());
        assert!(secret.exists());
    }

    #[tokio::test]
    async fn test_accept_missing_upload_hides_path() {
        let staging = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let source = UploadSource::new(staging.path());
        let source_ref = staging.path().join("gone.mp4").to_string_lossy().into_owned();

        let err = source.accept(&source_ref, work.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid source: Uploaded file is no longer available");
    }

    #[tokio::test]
    async fn test_discard_removes_staged_upload() {
        let staging = TempDir::new().unwrap();
        let source = UploadSource::new(staging.path());
        let staged = stage(staging.path(), "a.mp3", b"audio").await;
        let source_ref = staged.source_ref();
        staged.keep();

        assert!(source.discard(&source_ref).await.unwrap());
        assert_eq!(file_count(staging.path()), 0);
    }
}
