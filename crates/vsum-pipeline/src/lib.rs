//! Bounded-concurrency summary job pipeline.
//!
//! This crate provides:
//! - `AdmissionController`, a fixed-capacity slot registry
//! - `ProgressEmitter`/`ProgressStream`, a per-job ordered event channel
//! - `Pipeline`, the acquire/transcribe/summarize orchestrator
//! - `SummaryService`, which admits jobs and runs them with cancellation
//! - `OpenAiClient`, the production transcription and summarization backend

pub mod admission;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod openai;
pub mod orchestrator;
pub mod progress;
pub mod service;
pub mod stages;

pub use admission::{AdmissionController, AdmissionGuard};
pub use config::{OpenAiConfig, PipelineConfig};
pub use error::{
    BackendError, PipelineError, PipelineResult, AT_CAPACITY_MESSAGE, PROCESSING_FAILED_MESSAGE,
};
pub use logging::JobLogger;
pub use openai::OpenAiClient;
pub use orchestrator::Pipeline;
pub use progress::{channel as progress_channel, ProgressEmitter, ProgressStream};
pub use service::{JobHandle, JobOutcome, ServiceStatus, SummaryService};
pub use stages::{MediaSource, Summarizer, SummaryOptions, Transcriber};

pub use tokio_util::sync::CancellationToken;
