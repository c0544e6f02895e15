//! Per-job working areas.
//!
//! A [`ResourceScope`] owns one freshly created directory named after the job
//! identifier. Everything a job writes lives underneath it, and the directory
//! is removed when the scope is disposed or dropped, whichever comes first.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use vsum_models::JobId;

use crate::error::{MediaError, MediaResult};

/// Isolated working area for one job.
#[derive(Debug)]
pub struct ResourceScope {
    path: PathBuf,
    job_id: JobId,
    disposed: AtomicBool,
}

impl ResourceScope {
    /// Allocate a fresh, empty working area for `job_id` under `root`.
    ///
    /// Fails with [`MediaError::ScopeExists`] if the directory is already
    /// present, so two live scopes can never share a path.
    pub async fn open(root: impl AsRef<Path>, job_id: &JobId) -> MediaResult<Self> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root).await?;

        let path = root.join(job_id.as_str());
        match tokio::fs::create_dir(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(MediaError::ScopeExists(path));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(job_id = %job_id, path = %path.display(), "Opened resource scope");

        Ok(Self {
            path,
            job_id: job_id.clone(),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Path of an entry inside the working area.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Recursively remove the working area.
    ///
    /// Only the first call touches the filesystem; later calls return `Ok`.
    /// A directory that has already vanished counts as removed.
    pub async fn dispose(&self) -> MediaResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(job_id = %self.job_id, "Disposed resource scope");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Reached on panics and on futures dropped mid-flight. Inside a
        // runtime the removal goes to the blocking pool.
        let path = std::mem::take(&mut self.path);
        let job_id = self.job_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_on_drop(&path, &job_id));
            }
            Err(_) => remove_on_drop(&path, &job_id),
        }
    }
}

fn remove_on_drop(path: &Path, job_id: &JobId) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(job_id = %job_id, "Disposed resource scope on drop"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(
            job_id = %job_id,
            path = %path.display(),
            error = %e,
            "Failed to remove resource scope on drop"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_empty_directory() {
        let root = TempDir::new().unwrap();
        let job_id = JobId::new();

        let scope = ResourceScope::open(root.path(), &job_id).await.unwrap();

        assert!(scope.path().is_dir());
        assert_eq!(scope.path(), root.path().join(job_id.as_str()));
        assert_eq!(std::fs::read_dir(scope.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_open_rejects_existing_scope() {
        let root = TempDir::new().unwrap();
        let job_id = JobId::new();

        let _first = ResourceScope::open(root.path(), &job_id).await.unwrap();
        let second = ResourceScope::open(root.path(), &job_id).await;

        assert!(matches!(second, Err(MediaError::ScopeExists(_))));
    }

    #[tokio::test]
    async fn test_dispose_removes_nested_content() {
        let root = TempDir::new().unwrap();
        let scope = ResourceScope::open(root.path(), &JobId::new()).await.unwrap();
        tokio::fs::create_dir_all(scope.join("nested/deeper")).await.unwrap();
        tokio::fs::write(scope.join("nested/deeper/audio.mp3"), b"data").await.unwrap();

        scope.dispose().await.unwrap();

        assert!(!scope.path().exists());
        assert!(scope.is_disposed());
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let root = TempDir::new().unwrap();
        let scope = ResourceScope::open(root.path(), &JobId::new()).await.unwrap();

        scope.dispose().await.unwrap();
        // Recreate the path; a second dispose must not delete it again.
        tokio::fs::create_dir(scope.path()).await.unwrap();
        scope.dispose().await.unwrap();

        assert!(scope.path().exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = {
            let scope = ResourceScope::open(root.path(), &JobId::new()).await.unwrap();
            tokio::fs::write(scope.join("partial.part"), b"x").await.unwrap();
            scope.path().to_path_buf()
        };

        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_outside_runtime_removes_directory() {
        let root = TempDir::new().unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let scope = rt
            .block_on(ResourceScope::open(root.path(), &JobId::new()))
            .unwrap();
        let path = scope.path().to_path_buf();
        drop(rt);

        drop(scope);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dispose_tolerates_missing_directory() {
        let root = TempDir::new().unwrap();
        let scope = ResourceScope::open(root.path(), &JobId::new()).await.unwrap();
        std::fs::remove_dir_all(scope.path()).unwrap();

        assert!(scope.dispose().await.is_ok());
    }
}
