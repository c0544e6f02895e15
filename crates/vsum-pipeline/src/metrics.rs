//! Job pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ADMITTED_TOTAL: &str = "vsum_jobs_admitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "vsum_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vsum_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vsum_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "vsum_jobs_in_flight";
    pub const STAGE_DURATION_SECONDS: &str = "vsum_stage_duration_seconds";
    pub const CLEANUP_FAILURES_TOTAL: &str = "vsum_cleanup_failures_total";
    pub const PROGRESS_EVENTS_DROPPED_TOTAL: &str = "vsum_progress_events_dropped_total";
}

pub fn record_job_admitted(in_flight: usize) {
    counter!(names::JOBS_ADMITTED_TOTAL).increment(1);
    gauge!(names::JOBS_IN_FLIGHT).set(in_flight as f64);
}

pub fn record_job_rejected() {
    counter!(names::JOBS_REJECTED_TOTAL).increment(1);
}

pub fn record_slot_released(in_flight: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(in_flight as f64);
}

pub fn record_job_completed(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

pub fn record_job_failed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed media release or scope disposal.
pub fn record_cleanup_failure(resource: &str) {
    let labels = [("resource", resource.to_string())];
    counter!(names::CLEANUP_FAILURES_TOTAL, &labels).increment(1);
}

pub fn record_progress_dropped(count: u64) {
    counter!(names::PROGRESS_EVENTS_DROPPED_TOTAL).increment(count);
}
