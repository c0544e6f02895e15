//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    get_status, get_summary, get_summary_sse, get_transcript, get_video_info, health,
    post_upload_summary, post_upload_summary_sse, post_upload_transcript,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::per_minute(
        state.config.rate_limit_per_minute,
    ));

    // Uploads get their own, larger body limit.
    let upload_routes = Router::new()
        .route("/summary", post(post_upload_summary))
        .route("/summary-sse", post(post_upload_summary_sse))
        .route("/transcript", post(post_upload_transcript))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size));

    let api_routes = Router::new()
        .route("/summary", get(get_summary))
        .route("/summary-sse", get(get_summary_sse))
        .route("/transcript", get(get_transcript))
        .route("/info", get(get_video_info))
        .route("/status", get(get_status))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .nest("/upload", upload_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
