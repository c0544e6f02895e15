//! Job submission: admission, spawning and cancellation.

use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, Stream};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, Instrument};
use vsum_models::{AdmissionSlot, Job, JobId, JobOutput, JobRequest, ProgressEvent};

use crate::admission::AdmissionController;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::orchestrator::Pipeline;
use crate::progress::{self, ProgressStream};

/// Point-in-time view of the service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub capacity: usize,
    pub in_flight: usize,
    pub uptime_secs: u64,
    pub slots: Vec<AdmissionSlot>,
}

/// Admits jobs and runs them on the tokio runtime.
pub struct SummaryService {
    admission: Arc<AdmissionController>,
    pipeline: Arc<Pipeline>,
    started: Instant,
}

impl SummaryService {
    /// Capacity comes from the pipeline's `max_concurrent_jobs`.
    pub fn new(pipeline: Pipeline) -> Self {
        let admission = Arc::new(AdmissionController::new(
            pipeline.config().max_concurrent_jobs,
        ));
        Self {
            admission,
            pipeline: Arc::new(pipeline),
            started: Instant::now(),
        }
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Admit `request` and start it.
    ///
    /// Never waits for capacity: a full service returns
    /// [`PipelineError::AdmissionRejected`] immediately. Must be called from
    /// within a tokio runtime.
    pub fn submit(
        &self,
        request: JobRequest,
        client_ip: Option<String>,
    ) -> PipelineResult<JobHandle> {
        let job_id = JobId::new();
        let slot = self.admission.admit(&job_id, client_ip)?;

        let job = Job::from_request(job_id.clone(), request);
        let (emitter, events) = progress::channel(self.pipeline.config().progress_buffer);
        let cancel = CancellationToken::new();

        let pipeline = Arc::clone(&self.pipeline);
        let token = cancel.clone();
        let span = JobLogger::for_job(&job).create_span();

        let outcome = tokio::spawn(
            async move {
                let result = pipeline.run(&job, &emitter, &token).await;
                drop(emitter);
                // Released after the terminal event and all cleanup. A panic
                // in `run` unwinds through here and drops it too.
                drop(slot);
                result
            }
            .instrument(span),
        );

        Ok(JobHandle {
            job_id,
            events,
            cancel,
            outcome,
        })
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            capacity: self.admission.capacity(),
            in_flight: self.admission.in_flight_count(),
            uptime_secs: self.started.elapsed().as_secs(),
            slots: self.admission.snapshot(),
        }
    }
}

/// Caller's handle on a running job.
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    events: ProgressStream,
    cancel: CancellationToken,
    outcome: JoinHandle<PipelineResult<JobOutput>>,
}

impl JobHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Request cancellation of whatever stage is in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the final outcome, discarding progress.
    ///
    /// Dropping the returned future cancels the job.
    pub async fn wait(self) -> PipelineResult<JobOutput> {
        let JobHandle {
            job_id,
            events,
            cancel,
            outcome,
        } = self;
        drop(events);

        let guard = cancel.drop_guard();
        let result = join_outcome(&job_id, outcome).await;
        guard.disarm();
        result
    }

    /// Progress events in emission order, ending after the terminal event.
    ///
    /// Dropping the stream before it ends cancels the job.
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let guard = self.cancel.drop_guard();
        stream::unfold((self.events, guard), |(mut events, guard)| async move {
            let event = events.recv().await?;
            Some((event, (events, guard)))
        })
    }

    /// Split into the event stream and the outcome, for callers that need
    /// both.
    pub fn into_parts(self) -> (ProgressStream, JobOutcome) {
        (
            self.events,
            JobOutcome {
                job_id: self.job_id,
                cancel: self.cancel,
                outcome: self.outcome,
            },
        )
    }
}

/// Final outcome of a job whose events are consumed elsewhere.
#[derive(Debug)]
pub struct JobOutcome {
    job_id: JobId,
    cancel: CancellationToken,
    outcome: JoinHandle<PipelineResult<JobOutput>>,
}

impl JobOutcome {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> PipelineResult<JobOutput> {
        join_outcome(&self.job_id, self.outcome).await
    }
}

async fn join_outcome(
    job_id: &JobId,
    outcome: JoinHandle<PipelineResult<JobOutput>>,
) -> PipelineResult<JobOutput> {
    match outcome.await {
        Ok(result) => result,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Job task aborted");
            Err(PipelineError::processing_failed(format!("job task aborted: {}", e)))
        }
    }
}
