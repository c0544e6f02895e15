//! Pipeline error types.

use thiserror::Error;
use vsum_media::MediaError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Message shown to callers for any transcription or summarization failure.
pub const PROCESSING_FAILED_MESSAGE: &str = "Something went wrong during video processing";

/// Message shown to callers when capacity is exhausted.
pub const AT_CAPACITY_MESSAGE: &str = "Server is busy. Please try again later.";

/// Job-level outcome taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Capacity exhausted; not a failure of any job logic.
    #[error("Server is busy. Please try again later.")]
    AdmissionRejected,

    /// The source could not be fetched. The message is caller-actionable.
    #[error("{0}")]
    AcquisitionFailed(String),

    /// A transcription or summarization backend failed.
    #[error("Something went wrong during video processing: {cause}")]
    ProcessingFailed { cause: String },

    #[error("Job cancelled")]
    Cancelled,

    /// Disposal of a working area or media file failed.
    #[error("Resource cleanup failed: {0}")]
    ResourceCleanupFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn acquisition_failed(msg: impl Into<String>) -> Self {
        Self::AcquisitionFailed(msg.into())
    }

    pub fn processing_failed(cause: impl Into<String>) -> Self {
        Self::ProcessingFailed {
            cause: cause.into(),
        }
    }

    pub fn cleanup_failed(msg: impl Into<String>) -> Self {
        Self::ResourceCleanupFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Text safe to show to the caller.
    ///
    /// Processing failures hide backend internals; acquisition errors are
    /// surfaced verbatim.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::AdmissionRejected => AT_CAPACITY_MESSAGE.to_string(),
            PipelineError::AcquisitionFailed(msg) => msg.clone(),
            PipelineError::ProcessingFailed { .. } => PROCESSING_FAILED_MESSAGE.to_string(),
            PipelineError::Cancelled => "Job cancelled".to_string(),
            PipelineError::ResourceCleanupFailed(_) | PipelineError::Config(_) => {
                PROCESSING_FAILED_MESSAGE.to_string()
            }
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::AdmissionRejected => "admission_rejected",
            PipelineError::AcquisitionFailed(_) => "acquisition_failed",
            PipelineError::ProcessingFailed { .. } => "processing_failed",
            PipelineError::Cancelled => "cancelled",
            PipelineError::ResourceCleanupFailed(_) => "resource_cleanup_failed",
            PipelineError::Config(_) => "config",
        }
    }

    /// Only a rejected admission is worth retrying later; everything else
    /// is a hard failure for this request.
    pub fn is_retryable_later(&self) -> bool {
        matches!(self, PipelineError::AdmissionRejected)
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::AcquisitionFailed(other.to_string()),
        }
    }
}

/// Failures of the transcription and summarization backends.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}
