//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while acquiring or releasing media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp not found: {0}")]
    YtDlpNotFound(String),

    #[error("{message}")]
    DownloadFailed { message: String },

    #[error("YouTube requires authentication. Please check your cookies configuration.")]
    AuthenticationRequired,

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Uploaded file exceeds the {0} byte limit")]
    UploadTooLarge(u64),

    #[error("Working area already exists: {0}")]
    ScopeExists(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create an invalid source error.
    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource(message.into())
    }
}
