//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use vsum_media::MediaError;
use vsum_pipeline::{PipelineError, AT_CAPACITY_MESSAGE, PROCESSING_FAILED_MESSAGE};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Admission rejected; distinct from any job failure.
    #[error("Server is busy. Please try again later.")]
    Busy,

    /// Media could not be acquired. Message is caller-actionable.
    #[error("{0}")]
    Acquisition(String),

    /// A processing stage failed. Carries the public message only.
    #[error("{0}")]
    Processing(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Acquisition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Processing(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Busy => "at_capacity",
            ApiError::Acquisition(_) => "acquisition_failed",
            ApiError::Processing(_) => "processing_failed",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::AdmissionRejected => ApiError::Busy,
            PipelineError::AcquisitionFailed(msg) => ApiError::Acquisition(msg),
            other @ (PipelineError::ProcessingFailed { .. } | PipelineError::Cancelled) => {
                ApiError::Processing(other.public_message())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::YtDlpNotFound(_) | MediaError::Io(_) | MediaError::JsonParse(_) => {
                ApiError::Internal(err.to_string())
            }
            MediaError::UploadTooLarge(_) => ApiError::PayloadTooLarge(err.to_string()),
            MediaError::EmptyUpload => ApiError::Validation(err.to_string()),
            other => ApiError::Acquisition(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let error = match &self {
            ApiError::Busy => AT_CAPACITY_MESSAGE.to_string(),
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    PROCESSING_FAILED_MESSAGE.to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error,
            code: Some(self.code().to_string()),
        };

        (status, Json(body)).into_response()
    }
}
