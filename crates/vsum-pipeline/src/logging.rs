//! Structured job logging.
//!
//! Every line a job writes carries its `job_id` and output `mode`, so a
//! single job's lifecycle can be filtered out of interleaved logs.

use tracing::{error, info, warn, Span};
use vsum_models::{Job, JobId, JobState, OutputMode};

/// Job-scoped logger.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    mode: OutputMode,
}

impl JobLogger {
    pub fn new(job_id: &JobId, mode: OutputMode) -> Self {
        Self {
            job_id: job_id.to_string(),
            mode,
        }
    }

    pub fn for_job(job: &Job) -> Self {
        Self::new(&job.id, job.mode)
    }

    pub fn log_start(&self, source_ref: &str) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            source = %source_ref,
            "Job started"
        );
    }

    /// Log a state machine step.
    pub fn log_transition(&self, from: JobState, to: JobState) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            from = %from,
            to = %to,
            "Job state changed"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            mode = %self.mode,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            mode = %self.mode,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, output_len: usize, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            mode = %self.mode,
            output_len,
            elapsed_secs,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Span to instrument the job's task with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, mode = %self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsum_models::JobRequest;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, OutputMode::TranscriptOnly);

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.mode(), OutputMode::TranscriptOnly);
    }

    #[test]
    fn test_job_logger_for_job() {
        let job = Job::from_request(
            JobId::from_string("job-123"),
            JobRequest::summary("https://youtu.be/abc"),
        );
        let logger = JobLogger::for_job(&job);

        assert_eq!(logger.job_id(), "job-123");
        assert_eq!(logger.mode(), OutputMode::Summary);
    }
}
