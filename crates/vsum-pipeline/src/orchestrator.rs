//! Drives one job through acquire, transcribe and summarize.
//!
//! The orchestrator owns the job's [`ResourceScope`] and [`MediaHandle`] for
//! the duration of [`Pipeline::run`]. Every exit path emits exactly one
//! terminal progress event, then releases the media and disposes the scope.
//! Cleanup failures are logged and counted but never replace the job's
//! outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use vsum_media::{MediaHandle, ResourceScope, UploadSource};
use vsum_models::{
    Job, JobOutput, JobState, ProgressEvent, SourceKind, PROGRESS_ACQUIRING,
    PROGRESS_SUMMARIZING, PROGRESS_TRANSCRIBING,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::ProgressEmitter;
use crate::stages::{MediaSource, Summarizer, SummaryOptions, Transcriber};

pub const ACQUIRING_MESSAGE: &str = "Acquiring media";
pub const TRANSCRIBING_MESSAGE: &str = "Generating transcript";
pub const SUMMARIZING_MESSAGE: &str = "Generating summary";

/// Stage wiring plus configuration, shared by all jobs.
///
/// Remote jobs acquire through the configured source; upload jobs through
/// an [`UploadSource`] over the configured upload directory.
pub struct Pipeline {
    source: Arc<dyn MediaSource>,
    uploads: Arc<dyn MediaSource>,
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    config: PipelineConfig,
}

/// Mutable bookkeeping for one run.
struct JobRun<'a> {
    job: &'a Job,
    logger: JobLogger,
    state: JobState,
    media: Option<MediaHandle>,
    media_released: bool,
}

impl<'a> JobRun<'a> {
    fn new(job: &'a Job) -> Self {
        Self {
            job,
            logger: JobLogger::for_job(job),
            state: JobState::Created,
            media: None,
            media_released: false,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        self.logger.log_transition(self.state, next);
        self.state = next;
    }
}

/// Race `fut` against cancellation.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> PipelineResult<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        out = fut => Ok(out),
    }
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn MediaSource>,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        config: PipelineConfig,
    ) -> Self {
        let uploads = Arc::new(UploadSource::new(config.upload_dir()));
        Self {
            source,
            uploads,
            transcriber,
            summarizer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn source_for(&self, job: &Job) -> &dyn MediaSource {
        match job.source_kind {
            SourceKind::Remote => self.source.as_ref(),
            SourceKind::Upload => self.uploads.as_ref(),
        }
    }

    /// Run `job` to completion, reporting progress through `progress`.
    ///
    /// Returns once the terminal event has been emitted and all job
    /// resources have been released.
    pub async fn run(
        &self,
        job: &Job,
        progress: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> PipelineResult<JobOutput> {
        let started = Instant::now();
        let mut run = JobRun::new(job);
        run.logger.log_start(&job.source_ref);

        let scope = match ResourceScope::open(&self.config.work_dir, &job.id).await {
            Ok(scope) => scope,
            Err(e) => {
                let err = PipelineError::processing_failed(format!(
                    "failed to open working area: {}",
                    e
                ));
                self.fail(&mut run, progress, &err).await;
                return Err(err);
            }
        };

        let outcome = self.drive(&mut run, &scope, progress, cancel).await;

        match &outcome {
            Ok(output) => {
                progress.emit(ProgressEvent::done(output.text.clone()));
                metrics::record_job_completed(job.mode.as_str());
                run.logger
                    .log_completion(output.text.len(), started.elapsed().as_secs_f64());
            }
            Err(err) => self.fail(&mut run, progress, err).await,
        }

        if let Err(e) = scope.dispose().await {
            let diag = PipelineError::cleanup_failed(e.to_string());
            run.logger.log_warning(&diag.to_string());
            metrics::record_cleanup_failure("scope");
        }

        outcome
    }

    async fn drive(
        &self,
        run: &mut JobRun<'_>,
        scope: &ResourceScope,
        progress: &ProgressEmitter,
        cancel: &CancellationToken,
    ) -> PipelineResult<JobOutput> {
        let job = run.job;

        run.advance(JobState::Acquiring);
        progress.emit(ProgressEvent::processing(ACQUIRING_MESSAGE, PROGRESS_ACQUIRING));
        let timer = Instant::now();
        let media = cancellable(cancel, self.source_for(job).acquire(&job.source_ref, scope)).await??;
        metrics::record_stage_duration("acquire", timer.elapsed().as_secs_f64());
        run.media = Some(media);

        run.advance(JobState::Transcribing);
        progress.emit(ProgressEvent::processing(
            TRANSCRIBING_MESSAGE,
            PROGRESS_TRANSCRIBING,
        ));
        let timer = Instant::now();
        let transcript = match run.media.as_ref() {
            Some(media) => cancellable(cancel, self.transcriber.transcribe(media))
                .await?
                .map_err(|e| PipelineError::processing_failed(e.to_string()))?,
            None => return Err(PipelineError::processing_failed("media missing after acquire")),
        };
        metrics::record_stage_duration("transcribe", timer.elapsed().as_secs_f64());

        if job.is_transcript_only() {
            self.release_media(run).await;
            run.advance(JobState::TranscriptOnlyDone);
            run.advance(JobState::Done);
            return Ok(JobOutput {
                mode: job.mode,
                text: transcript,
            });
        }

        run.advance(JobState::Summarizing);
        progress.emit(ProgressEvent::processing(
            SUMMARIZING_MESSAGE,
            PROGRESS_SUMMARIZING,
        ));
        let options = SummaryOptions {
            word_budget: job.word_budget,
            instructions: job.instructions.clone(),
        };

        // Deletion is not cancellable and always runs to completion next to
        // the summarizer call.
        let timer = Instant::now();
        let (_, summary) = tokio::join!(
            self.release_media(run),
            cancellable(cancel, self.summarizer.summarize(&transcript, &options)),
        );
        let summary = summary?.map_err(|e| PipelineError::processing_failed(e.to_string()))?;
        metrics::record_stage_duration("summarize", timer.elapsed().as_secs_f64());

        run.advance(JobState::Done);
        Ok(JobOutput {
            mode: job.mode,
            text: summary,
        })
    }

    /// Release the job's media if it has not been released yet.
    ///
    /// Failures are secondary diagnostics only. Returns `true` when no media
    /// remains to be released.
    async fn release_media(&self, run: &mut JobRun<'_>) -> bool {
        if run.media_released {
            return true;
        }
        let Some(media) = run.media.as_ref() else {
            return true;
        };
        run.media_released = true;

        match self.source_for(run.job).release(media).await {
            Ok(()) => true,
            Err(e) => {
                let diag = PipelineError::cleanup_failed(e.to_string());
                run.logger.log_warning(&diag.to_string());
                metrics::record_cleanup_failure("media");
                false
            }
        }
    }

    /// Move to `Failed`, emit the error event, then release media. A job
    /// that never acquired its media discards the source material instead.
    async fn fail(&self, run: &mut JobRun<'_>, progress: &ProgressEmitter, err: &PipelineError) {
        run.advance(JobState::Failed);
        match err {
            PipelineError::Cancelled => run.logger.log_warning("cancelled"),
            other => run.logger.log_error(&other.to_string()),
        }
        metrics::record_job_failed(err.kind());

        progress.emit(ProgressEvent::error(err.public_message()));

        if run.media.is_some() {
            self.release_media(run).await;
        } else if let Err(e) = self.source_for(run.job).discard(&run.job.source_ref).await {
            let diag = PipelineError::cleanup_failed(e.to_string());
            run.logger.log_warning(&diag.to_string());
            metrics::record_cleanup_failure("source");
        }
    }
}
