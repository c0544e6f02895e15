//! Summary and transcript handlers.
//!
//! Each request is admitted before any work or streaming starts, so a full
//! server answers `503` rather than an in-stream error event.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vsum_models::{JobRequest, OutputMode, ProgressEvent, MAX_SUMMARY_WORDS};
use vsum_pipeline::JobHandle;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::middleware::client_ip;
use crate::security::{sanitize_string, validate_video_url};
use crate::state::AppState;

/// Query parameters shared by the job endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    pub url: Option<String>,
    /// Summary length in words; kept as text so bad values get a 400 with
    /// our own message.
    pub words: Option<String>,
    pub prompt: Option<String>,
}

/// `{"data": ...}` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub data: String,
}

pub(crate) fn parse_words(raw: Option<&str>, default: u32) -> ApiResult<u32> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(default),
        Some(raw) => raw,
    };

    match raw.parse::<u32>() {
        Ok(words) if (1..=MAX_SUMMARY_WORDS).contains(&words) => Ok(words),
        _ => Err(ApiError::validation(format!(
            "words must be a number between 1 and {}",
            MAX_SUMMARY_WORDS
        ))),
    }
}

/// Validate query parameters into a job request.
pub fn build_job_request(
    query: &JobQuery,
    mode: OutputMode,
    default_words: u32,
) -> ApiResult<JobRequest> {
    let url = validate_video_url(query.url.as_deref().unwrap_or_default())
        .into_result()
        .map_err(ApiError::Validation)?;

    let mut request = match mode {
        OutputMode::Summary => JobRequest::summary(url)
            .with_word_budget(parse_words(query.words.as_deref(), default_words)?),
        OutputMode::TranscriptOnly => JobRequest::transcript_only(url),
    };

    if mode == OutputMode::Summary {
        if let Some(prompt) = query.prompt.as_deref() {
            request = request.with_instructions(sanitize_string(prompt));
        }
    }

    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    Ok(request)
}

pub(crate) fn caller_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    client_ip(headers, connect_info).map(|ip| ip.to_string())
}

pub(crate) async fn run_to_completion(
    state: &AppState,
    request: JobRequest,
    ip: Option<String>,
) -> ApiResult<Json<DataResponse>> {
    let handle = state.service.submit(request, ip)?;
    let job_id = handle.job_id().clone();
    let output = handle.wait().await?;

    info!(job_id = %job_id, mode = %output.mode, "Job response sent");
    Ok(Json(DataResponse { data: output.text }))
}

/// `GET /api/summary`
pub async fn get_summary(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<DataResponse>> {
    let default_words = state.service.pipeline().config().default_words;
    let request = build_job_request(&query, OutputMode::Summary, default_words)?;
    run_to_completion(&state, request, caller_ip(&headers, connect_info.as_ref())).await
}

/// `GET /api/transcript`
pub async fn get_transcript(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<DataResponse>> {
    let default_words = state.service.pipeline().config().default_words;
    let request = build_job_request(&query, OutputMode::TranscriptOnly, default_words)?;
    run_to_completion(&state, request, caller_ip(&headers, connect_info.as_ref())).await
}

fn to_sse_event(event: &ProgressEvent) -> Event {
    let update = event.to_update();
    Event::default()
        .json_data(&update)
        .unwrap_or_else(|_| Event::default().data(update.message))
}

/// `GET /api/summary-sse`
///
/// Streams `data: {"status","message","progress"}` events. The stream ends
/// after the terminal event; a client disconnect cancels the job.
pub async fn get_summary_sse(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<JobQuery>,
) -> ApiResult<Response> {
    let default_words = state.service.pipeline().config().default_words;
    let request = build_job_request(&query, OutputMode::Summary, default_words)?;

    let handle = state
        .service
        .submit(request, caller_ip(&headers, connect_info.as_ref()))?;
    Ok(progress_response(handle, "summary-sse"))
}

/// Stream a job's progress as SSE. Dropping the response body cancels the
/// job.
pub(crate) fn progress_response(handle: JobHandle, endpoint: &'static str) -> Response {
    debug!(job_id = %handle.job_id(), endpoint, "Opening progress stream");
    metrics::record_sse_stream(endpoint);

    let events = handle
        .into_stream()
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    let sse = Sse::new(events).keep_alive(KeepAlive::default());
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: &str, words: Option<&str>, prompt: Option<&str>) -> JobQuery {
        JobQuery {
            url: Some(url.to_string()),
            words: words.map(String::from),
            prompt: prompt.map(String::from),
        }
    }

    #[test]
    fn test_build_summary_request_defaults() {
        let request = build_job_request(
            &query("https://youtu.be/abc", None, None),
            OutputMode::Summary,
            400,
        )
        .unwrap();

        assert_eq!(request.mode, OutputMode::Summary);
        assert_eq!(request.word_budget, 400);
        assert_eq!(request.instructions, None);
    }

    #[test]
    fn test_build_summary_request_with_words_and_prompt() {
        let request = build_job_request(
            &query("https://youtu.be/abc", Some("150"), Some("Focus\u{0000} on numbers")),
            OutputMode::Summary,
            400,
        )
        .unwrap();

        assert_eq!(request.word_budget, 150);
        assert_eq!(request.instructions.as_deref(), Some("Focus on numbers"));
    }

    #[test]
    fn test_words_out_of_range_is_rejected() {
        for words in ["0", "5001", "many", "-3"] {
            let err = build_job_request(
                &query("https://youtu.be/abc", Some(words), None),
                OutputMode::Summary,
                400,
            )
            .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{words}");
        }
    }

    #[test]
    fn test_transcript_request_ignores_summary_options() {
        let request = build_job_request(
            &query("https://youtu.be/abc", Some("not-a-number"), Some("ignored")),
            OutputMode::TranscriptOnly,
            400,
        )
        .unwrap();

        assert_eq!(request.mode, OutputMode::TranscriptOnly);
        assert_eq!(request.instructions, None);
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let err = build_job_request(&JobQuery::default(), OutputMode::Summary, 400).unwrap_err();
        assert_eq!(err.to_string(), "URL is required");
    }
}
