//! API integration tests.
//!
//! The router runs against in-memory stages; no yt-dlp or OpenAI access.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use vsum_api::{create_router, ApiConfig, AppState};
use vsum_media::{MediaError, MediaHandle, MediaResult, ResourceScope, YtDlpConfig, YtDlpSource};
use vsum_models::{JobRequest, ProgressStatus, ProgressUpdate};
use vsum_pipeline::{
    BackendError, MediaSource, Pipeline, PipelineConfig, Summarizer, SummaryOptions,
    SummaryService, Transcriber, PROCESSING_FAILED_MESSAGE,
};

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Ok,
    AcquireFails,
    SummarizeFails,
    TranscribeHangs,
    /// Transcript is the media file's content.
    EchoMedia,
}

struct FakeSource(Mode);

#[async_trait]
impl MediaSource for FakeSource {
    async fn acquire(&self, _source_ref: &str, scope: &ResourceScope) -> MediaResult<MediaHandle> {
        if self.0 == Mode::AcquireFails {
            return Err(MediaError::AuthenticationRequired);
        }
        let path = scope.join("audio.mp3");
        tokio::fs::write(&path, b"fake audio").await?;
        MediaHandle::from_file(path).await
    }
}

struct FakeBackend(Mode);

#[async_trait]
impl Transcriber for FakeBackend {
    async fn transcribe(&self, media: &MediaHandle) -> Result<String, BackendError> {
        match self.0 {
            Mode::TranscribeHangs => std::future::pending::<()>().await,
            Mode::EchoMedia => {
                let bytes = tokio::fs::read(media.path()).await?;
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            _ => {}
        }
        Ok("hello world".to_string())
    }
}

#[async_trait]
impl Summarizer for FakeBackend {
    async fn summarize(
        &self,
        _transcript: &str,
        options: &SummaryOptions,
    ) -> Result<String, BackendError> {
        if self.0 == Mode::SummarizeFails {
            return Err(BackendError::request("connection reset by peer"));
        }
        Ok(format!("hi world ({} words)", options.word_budget))
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    _work_dir: TempDir,
}

fn test_app(mode: Mode, capacity: usize, config: ApiConfig) -> TestApp {
    let work_dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend(mode));
    let pipeline = Pipeline::new(
        Arc::new(FakeSource(mode)),
        backend.clone(),
        backend,
        PipelineConfig {
            max_concurrent_jobs: capacity,
            work_dir: work_dir.path().to_path_buf(),
            ..PipelineConfig::default()
        },
    );

    let state = AppState::new(
        config,
        SummaryService::new(pipeline),
        Arc::new(YtDlpSource::new(YtDlpConfig::default())),
    );

    TestApp {
        router: create_router(state.clone(), None),
        state,
        _work_dir: work_dir,
    }
}

fn default_app(mode: Mode) -> TestApp {
    test_app(mode, 2, ApiConfig::default())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

fn sse_updates(body: Vec<u8>) -> Vec<ProgressUpdate> {
    String::from_utf8(body)
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

const BOUNDARY: &str = "vsum-test-boundary";

fn upload_request(uri: &str, field: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"talk.mp4\"\r\nContent-Type: video/mp4\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

impl TestApp {
    fn upload_dir_is_empty(&self) -> bool {
        let dir = self.state.service.pipeline().config().upload_dir();
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

#[tokio::test]
async fn test_health_endpoint_with_security_headers() {
    let app = default_app(Mode::Ok);

    let (status, headers, body) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "healthy");
    assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
    assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
    assert!(headers.contains_key("X-Request-ID"));
}

#[tokio::test]
async fn test_summary_returns_data() {
    let app = default_app(Mode::Ok);

    let (status, _, body) = get(
        &app.router,
        "/api/summary?url=https://youtu.be/N-ZNfuCdkUo&words=5",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"], "hi world (5 words)");
    assert_eq!(app.state.service.status().in_flight, 0);
}

#[tokio::test]
async fn test_transcript_returns_transcript() {
    let app = default_app(Mode::Ok);

    let (status, _, body) = get(&app.router, "/api/transcript?url=https://youtu.be/abc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"], "hello world");
}

#[tokio::test]
async fn test_invalid_input_is_400() {
    let app = default_app(Mode::Ok);

    for uri in [
        "/api/summary",
        "/api/summary?url=https://malicious-site.com/v.mp4",
        "/api/summary?url=http://169.254.169.254/latest",
        "/api/summary?url=https://youtu.be/abc&words=0",
        "/api/summary-sse?url=https://youtu.be/abc&words=lots",
    ] {
        let (status, _, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json(&body)["code"], "validation_error");
    }
}

#[tokio::test]
async fn test_acquisition_failure_is_surfaced_verbatim() {
    let app = default_app(Mode::AcquireFails);

    let (status, _, body) = get(&app.router, "/api/summary?url=https://youtu.be/abc").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json(&body)["error"],
        "YouTube requires authentication. Please check your cookies configuration."
    );
}

#[tokio::test]
async fn test_processing_failure_is_generic() {
    let app = default_app(Mode::SummarizeFails);

    let (status, _, body) = get(&app.router, "/api/summary?url=https://youtu.be/abc").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["error"], PROCESSING_FAILED_MESSAGE);
    assert_eq!(app.state.service.status().in_flight, 0);
}

#[tokio::test]
async fn test_busy_server_returns_503_before_streaming() {
    let app = test_app(Mode::TranscribeHangs, 1, ApiConfig::default());
    let running = app
        .state
        .service
        .submit(JobRequest::summary("https://youtu.be/held"), None)
        .unwrap();

    for uri in [
        "/api/summary?url=https://youtu.be/abc",
        "/api/summary-sse?url=https://youtu.be/abc",
        "/api/transcript?url=https://youtu.be/abc",
    ] {
        let (status, headers, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        assert_ne!(
            headers.get("content-type").map(|v| v.to_str().unwrap()),
            Some("text/event-stream")
        );
        assert_eq!(json(&body)["error"], "Server is busy. Please try again later.");
    }

    running.cancel();
    let _ = running.wait().await;
}

#[tokio::test]
async fn test_summary_sse_streams_progress() {
    let app = default_app(Mode::Ok);

    let (status, headers, body) = get(
        &app.router,
        "/api/summary-sse?url=https://youtu.be/abc&words=5",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let text = String::from_utf8(body).unwrap();
    let updates: Vec<ProgressUpdate> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();

    let progress: Vec<u8> = updates.iter().map(|u| u.progress).collect();
    assert_eq!(progress, vec![10, 40, 70, 100]);
    assert_eq!(updates[0].message, "Acquiring media");
    assert_eq!(updates[3].status, ProgressStatus::Done);
    assert_eq!(updates[3].message, "hi world (5 words)");
}

#[tokio::test]
async fn test_summary_sse_reports_error_event() {
    let app = default_app(Mode::SummarizeFails);

    let (status, _, body) = get(&app.router, "/api/summary-sse?url=https://youtu.be/abc").await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    let last: ProgressUpdate = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .last()
        .map(|data| serde_json::from_str(data).unwrap())
        .unwrap();

    assert_eq!(last.status, ProgressStatus::Error);
    assert_eq!(last.message, PROCESSING_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_status_reports_capacity_and_jobs() {
    let app = test_app(Mode::TranscribeHangs, 2, ApiConfig::default());
    let running = app
        .state
        .service
        .submit(JobRequest::summary("https://youtu.be/held"), Some("203.0.113.5".into()))
        .unwrap();

    let (status, _, body) = get(&app.router, "/api/status").await;
    let body = json(&body);

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], true);
    assert_eq!(body["port"], 5050);
    assert_eq!(body["url"], "http://localhost:5050");
    assert_eq!(body["capacity"], 2);
    assert_eq!(body["activeRequests"], 1);
    assert_eq!(body["jobs"][0]["jobId"], running.job_id().to_string());
    assert_eq!(body["jobs"][0]["ip"], "203.0.113.5");

    running.cancel();
    let _ = running.wait().await;
}

#[tokio::test]
async fn test_rate_limiting_per_client_ip() {
    let config = ApiConfig {
        rate_limit_per_minute: 2,
        ..ApiConfig::default()
    };
    let app = test_app(Mode::Ok, 2, config);

    let request = |ip: &str| {
        Request::builder()
            .uri("/api/status")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.router.clone().oneshot(request("198.51.100.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.router.clone().oneshot(request("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    let response = app.router.clone().oneshot(request("198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health checks are not rate limited.
    let (status, _, _) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let app = default_app(Mode::Ok);

    let (status, _, _) = get(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_transcript_uses_uploaded_file() {
    let app = default_app(Mode::EchoMedia);

    let (status, _, body) = send(
        &app.router,
        upload_request("/api/upload/transcript", "file", b"spoken words from the upload"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"], "spoken words from the upload");
    assert_eq!(app.state.service.status().in_flight, 0);
    assert!(app.upload_dir_is_empty());
}

#[tokio::test]
async fn test_upload_summary_returns_data() {
    let app = default_app(Mode::Ok);

    let (status, _, body) = send(
        &app.router,
        upload_request("/api/upload/summary?words=5", "file", b"video bytes"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["data"], "hi world (5 words)");
    assert!(app.upload_dir_is_empty());
}

#[tokio::test]
async fn test_upload_summary_sse_streams_progress() {
    let app = default_app(Mode::Ok);

    let (status, headers, body) = send(
        &app.router,
        upload_request("/api/upload/summary-sse?words=5", "file", b"video bytes"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let updates = sse_updates(body);
    let progress: Vec<u8> = updates.iter().map(|u| u.progress).collect();
    assert_eq!(progress, vec![10, 40, 70, 100]);
    assert_eq!(updates[3].message, "hi world (5 words)");
    assert!(app.upload_dir_is_empty());
}

#[tokio::test]
async fn test_upload_without_file_field_is_400() {
    let app = default_app(Mode::Ok);

    let (status, _, body) = send(
        &app.router,
        upload_request("/api/upload/summary", "attachment", b"video bytes"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "validation_error");
    assert_eq!(json(&body)["error"], "No file provided");
    assert!(app.upload_dir_is_empty());
}

#[tokio::test]
async fn test_upload_when_busy_is_503_and_stages_nothing() {
    let app = test_app(Mode::TranscribeHangs, 1, ApiConfig::default());
    let running = app
        .state
        .service
        .submit(JobRequest::summary("https://youtu.be/held"), None)
        .unwrap();

    for uri in ["/api/upload/summary", "/api/upload/summary-sse", "/api/upload/transcript"] {
        let (status, _, body) = send(&app.router, upload_request(uri, "file", b"video bytes")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        assert_eq!(json(&body)["code"], "at_capacity");
    }
    assert!(app.upload_dir_is_empty());

    running.cancel();
    let _ = running.wait().await;
}

#[tokio::test]
async fn test_upload_over_limit_is_413() {
    let config = ApiConfig {
        max_upload_size: 16,
        ..ApiConfig::default()
    };
    let app = test_app(Mode::Ok, 2, config);

    let (status, _, _) = send(
        &app.router,
        upload_request("/api/upload/summary", "file", &[b'x'; 64]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.state.service.status().in_flight, 0);
    assert!(app.upload_dir_is_empty());
}
