//! Job definitions for the summary pipeline.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Default word budget for summaries.
pub const DEFAULT_SUMMARY_WORDS: u32 = 400;

/// Upper bound accepted for a word budget.
pub const MAX_SUMMARY_WORDS: u32 = 5000;

/// Maximum length of free-text steering instructions.
pub const MAX_INSTRUCTIONS_LENGTH: usize = 5000;

/// Unique identifier for a job.
///
/// Generated at admission from a random v4 UUID, so an identifier is never
/// reused while the process is alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the caller wants back from a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Transcribe, then summarize.
    #[default]
    Summary,
    /// Stop after transcription and return the transcript.
    TranscriptOnly,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Summary => "summary",
            OutputMode::TranscriptOnly => "transcript-only",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a job's media comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A URL fetched by the downloader.
    #[default]
    Remote,
    /// A file the caller uploaded, staged on local disk.
    Upload,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Remote => "remote",
            SourceKind::Upload => "upload",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline state of a job.
///
/// `Created` is initial; `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Created,
    Acquiring,
    Transcribing,
    Summarizing,
    TranscriptOnlyDone,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Acquiring => "acquiring",
            JobState::Transcribing => "transcribing",
            JobState::Summarizing => "summarizing",
            JobState::TranscriptOnlyDone => "transcript_only_done",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Acquiring)
                | (Created, Failed)
                | (Acquiring, Transcribing)
                | (Acquiring, Failed)
                | (Transcribing, Summarizing)
                | (Transcribing, TranscriptOnlyDone)
                | (Transcribing, Failed)
                | (Summarizing, Done)
                | (Summarizing, Failed)
                | (TranscriptOnlyDone, Done)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating a job request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("A source URL is required")]
    MissingSource,

    #[error("Word budget must be between 1 and 5000")]
    InvalidWordBudget,
}

/// A caller's request, before admission assigns it an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobRequest {
    /// Source reference: a URL, or a staged file path for uploads
    pub source_ref: String,

    /// How `source_ref` is resolved
    #[serde(default)]
    pub source_kind: SourceKind,

    /// Requested output
    #[serde(default)]
    pub mode: OutputMode,

    /// Summary length in words
    #[serde(default = "default_words")]
    pub word_budget: u32,

    /// Extra steering instructions for the summarizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

fn default_words() -> u32 {
    DEFAULT_SUMMARY_WORDS
}

impl JobRequest {
    /// Request a summary of `source_ref`.
    pub fn summary(source_ref: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            source_kind: SourceKind::Remote,
            mode: OutputMode::Summary,
            word_budget: DEFAULT_SUMMARY_WORDS,
            instructions: None,
        }
    }

    /// Request only the transcript of `source_ref`.
    pub fn transcript_only(source_ref: impl Into<String>) -> Self {
        Self {
            mode: OutputMode::TranscriptOnly,
            ..Self::summary(source_ref)
        }
    }

    pub fn with_source_kind(mut self, kind: SourceKind) -> Self {
        self.source_kind = kind;
        self
    }

    pub fn with_word_budget(mut self, words: u32) -> Self {
        self.word_budget = words;
        self
    }

    /// Attach steering instructions. Blank input clears them.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        self.instructions = if instructions.trim().is_empty() {
            None
        } else {
            Some(instructions)
        };
        self
    }

    /// Check the request is well-formed.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.source_ref.trim().is_empty() {
            return Err(RequestError::MissingSource);
        }
        if self.word_budget == 0 || self.word_budget > MAX_SUMMARY_WORDS {
            return Err(RequestError::InvalidWordBudget);
        }
        Ok(())
    }
}

/// An admitted job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Source reference: a URL, or a staged file path for uploads
    pub source_ref: String,

    /// How `source_ref` is resolved
    pub source_kind: SourceKind,

    /// Requested output
    pub mode: OutputMode,

    /// Summary length in words
    pub word_budget: u32,

    /// Extra steering instructions for the summarizer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Admission time
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Build a job from a request under an already-assigned identifier.
    pub fn from_request(id: JobId, request: JobRequest) -> Self {
        Self {
            id,
            source_ref: request.source_ref,
            source_kind: request.source_kind,
            mode: request.mode,
            word_budget: request.word_budget,
            instructions: request.instructions,
            created_at: Utc::now(),
        }
    }

    pub fn is_transcript_only(&self) -> bool {
        self.mode == OutputMode::TranscriptOnly
    }
}

/// Final payload of a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobOutput {
    pub mode: OutputMode,
    pub text: String,
}
