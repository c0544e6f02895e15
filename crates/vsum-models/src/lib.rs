//! Shared data models for the vsum backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job requests and pipeline states
//! - Progress events and their wire shape
//! - Admission slots

pub mod job;
pub mod progress;
pub mod slot;

// Re-export common types
pub use job::{
    Job, JobId, JobOutput, JobRequest, JobState, OutputMode, RequestError, SourceKind,
    DEFAULT_SUMMARY_WORDS, MAX_INSTRUCTIONS_LENGTH, MAX_SUMMARY_WORDS,
};
pub use progress::{
    ProgressEvent, ProgressStatus, ProgressUpdate, PROGRESS_ACQUIRING, PROGRESS_DONE,
    PROGRESS_SUMMARIZING, PROGRESS_TRANSCRIBING,
};
pub use slot::AdmissionSlot;
