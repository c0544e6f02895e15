//! Server status handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJob {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// RFC 3339 admission time
    pub since: String,
    pub held_secs: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub running: bool,
    pub url: String,
    pub port: u16,
    pub active_requests: usize,
    pub capacity: usize,
    /// Seconds since startup
    pub uptime: u64,
    pub jobs: Vec<ActiveJob>,
}

/// `GET /api/status`
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.service.status();

    let jobs = status
        .slots
        .into_iter()
        .map(|slot| ActiveJob {
            held_secs: slot.held_secs(),
            job_id: slot.job_id.to_string(),
            ip: slot.client_ip,
            since: slot.acquired_at.to_rfc3339(),
        })
        .collect();

    Json(StatusResponse {
        running: true,
        url: state.config.server_url(),
        port: state.config.port,
        active_requests: status.in_flight,
        capacity: status.capacity,
        uptime: status.uptime_secs,
        jobs,
    })
}
