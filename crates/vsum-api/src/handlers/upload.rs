//! Upload handlers: the summary, SSE and transcript endpoints over a
//! multipart file instead of a URL.
//!
//! The file is staged to disk before the job is submitted. A full server is
//! refused before the body is read; if a slot disappears while the body is
//! streaming, the staged file is removed and the caller still gets `503`.

use std::net::SocketAddr;

use axum::extract::multipart::MultipartError;
use axum::extract::{ConnectInfo, Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use vsum_media::{StagedUpload, UploadWriter};
use vsum_models::{JobRequest, OutputMode, SourceKind};
use vsum_pipeline::{JobHandle, PipelineError};

use crate::error::{ApiError, ApiResult};
use crate::handlers::summary::{caller_ip, parse_words, progress_response, DataResponse};
use crate::security::sanitize_string;
use crate::state::AppState;

/// Multipart field carrying the media file.
pub const UPLOAD_FIELD: &str = "file";

/// Query parameters of the upload endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub words: Option<String>,
    pub prompt: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// Write the `file` field of `multipart` into the upload staging area.
async fn stage_upload(state: &AppState, mut multipart: Multipart) -> ApiResult<StagedUpload> {
    let staging_dir = state.service.pipeline().config().upload_dir();
    let limit = state.config.max_upload_size as u64;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mut writer = UploadWriter::create(&staging_dir, &file_name, limit).await?;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            writer.write_chunk(&chunk).await?;
        }

        let staged = writer.finish().await?;
        info!(file_name = %file_name, size_bytes = staged.size_bytes(), "Upload staged");
        return Ok(staged);
    }

    Err(ApiError::validation("No file provided"))
}

fn build_upload_request(
    staged: &StagedUpload,
    query: &UploadQuery,
    mode: OutputMode,
    default_words: u32,
) -> ApiResult<JobRequest> {
    let request = match mode {
        OutputMode::Summary => {
            let mut request = JobRequest::summary(staged.source_ref())
                .with_word_budget(parse_words(query.words.as_deref(), default_words)?);
            if let Some(prompt) = query.prompt.as_deref() {
                request = request.with_instructions(sanitize_string(prompt));
            }
            request
        }
        OutputMode::TranscriptOnly => JobRequest::transcript_only(staged.source_ref()),
    };
    Ok(request.with_source_kind(SourceKind::Upload))
}

/// Stage the upload and submit a job for it.
async fn submit_upload(
    state: &AppState,
    ip: Option<String>,
    query: &UploadQuery,
    mode: OutputMode,
    multipart: Multipart,
) -> ApiResult<JobHandle> {
    if !state.service.admission().has_capacity() {
        return Err(PipelineError::AdmissionRejected.into());
    }

    let staged = stage_upload(state, multipart).await?;
    let default_words = state.service.pipeline().config().default_words;
    let request = build_upload_request(&staged, query, mode, default_words)?;

    // On rejection `staged` is dropped here and removes the file.
    let handle = state.service.submit(request, ip)?;
    staged.keep();
    Ok(handle)
}

async fn upload_to_completion(
    state: &AppState,
    ip: Option<String>,
    query: &UploadQuery,
    mode: OutputMode,
    multipart: Multipart,
) -> ApiResult<Json<DataResponse>> {
    let handle = submit_upload(state, ip, query, mode, multipart).await?;
    let job_id = handle.job_id().clone();
    let output = handle.wait().await?;

    info!(job_id = %job_id, mode = %output.mode, "Upload job response sent");
    Ok(Json(DataResponse { data: output.text }))
}

/// `POST /api/upload/summary`
pub async fn post_upload_summary(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> ApiResult<Json<DataResponse>> {
    let ip = caller_ip(&headers, connect_info.as_ref());
    upload_to_completion(&state, ip, &query, OutputMode::Summary, multipart).await
}

/// `POST /api/upload/transcript`
pub async fn post_upload_transcript(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> ApiResult<Json<DataResponse>> {
    let ip = caller_ip(&headers, connect_info.as_ref());
    upload_to_completion(&state, ip, &query, OutputMode::TranscriptOnly, multipart).await
}

/// `POST /api/upload/summary-sse`
pub async fn post_upload_summary_sse(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let ip = caller_ip(&headers, connect_info.as_ref());
    let handle = submit_upload(&state, ip, &query, OutputMode::Summary, multipart).await?;
    Ok(progress_response(handle, "upload-summary-sse"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn staged(dir: &TempDir) -> StagedUpload {
        let mut writer = UploadWriter::create(dir.path(), "talk.mp4", 64).await.unwrap();
        writer.write_chunk(b"bytes").await.unwrap();
        writer.finish().await.unwrap()
    }

    #[tokio::test]
    async fn test_upload_summary_request() {
        let dir = TempDir::new().unwrap();
        let staged = staged(&dir).await;
        let query = UploadQuery {
            words: Some("120".into()),
            prompt: Some("Focus on numbers".into()),
        };

        let request = build_upload_request(&staged, &query, OutputMode::Summary, 400).unwrap();

        assert_eq!(request.source_kind, SourceKind::Upload);
        assert_eq!(request.source_ref, staged.source_ref());
        assert_eq!(request.word_budget, 120);
        assert_eq!(request.instructions.as_deref(), Some("Focus on numbers"));
    }

    #[tokio::test]
    async fn test_upload_transcript_request_ignores_summary_options() {
        let dir = TempDir::new().unwrap();
        let staged = staged(&dir).await;
        let query = UploadQuery {
            words: Some("lots".into()),
            prompt: Some("ignored".into()),
        };

        let request =
            build_upload_request(&staged, &query, OutputMode::TranscriptOnly, 400).unwrap();

        assert_eq!(request.mode, OutputMode::TranscriptOnly);
        assert_eq!(request.instructions, None);
    }

    #[tokio::test]
    async fn test_upload_bad_word_budget_is_rejected() {
        let dir = TempDir::new().unwrap();
        let staged = staged(&dir).await;
        let query = UploadQuery {
            words: Some("0".into()),
            prompt: None,
        };

        let err = build_upload_request(&staged, &query, OutputMode::Summary, 400).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
