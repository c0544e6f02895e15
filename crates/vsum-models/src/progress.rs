//! Progress event types.
//!
//! [`ProgressEvent`] is what the pipeline emits; [`ProgressUpdate`] is the
//! flat `{status, message, progress}` shape sent to HTTP clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Percentage checkpoint when media acquisition starts.
pub const PROGRESS_ACQUIRING: u8 = 10;
/// Percentage checkpoint when transcription starts.
pub const PROGRESS_TRANSCRIBING: u8 = 40;
/// Percentage checkpoint when summarization starts.
pub const PROGRESS_SUMMARIZING: u8 = 70;
/// Percentage carried by the `done` event.
pub const PROGRESS_DONE: u8 = 100;

/// Status field of a progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Processing,
    Done,
    Error,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Processing => "processing",
            ProgressStatus::Done => "done",
            ProgressStatus::Error => "error",
        }
    }
}

/// An immutable record of pipeline advancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Stage boundary reached.
    Processing { message: String, progress: u8 },
    /// Job finished; carries the transcript or summary text.
    Done { payload: String },
    /// Job failed; terminates the sequence.
    Error { message: String },
}

impl ProgressEvent {
    /// Create a processing event. Percentages are clamped to 100.
    pub fn processing(message: impl Into<String>, progress: u8) -> Self {
        ProgressEvent::Processing {
            message: message.into(),
            progress: progress.min(PROGRESS_DONE),
        }
    }

    pub fn done(payload: impl Into<String>) -> Self {
        ProgressEvent::Done {
            payload: payload.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    pub fn status(&self) -> ProgressStatus {
        match self {
            ProgressEvent::Processing { .. } => ProgressStatus::Processing,
            ProgressEvent::Done { .. } => ProgressStatus::Done,
            ProgressEvent::Error { .. } => ProgressStatus::Error,
        }
    }

    /// `done` and `error` end the event sequence.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Processing { .. })
    }

    /// Percentage for ordering purposes.
    ///
    /// `None` for errors, which may occur at any point.
    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::Processing { progress, .. } => Some(*progress),
            ProgressEvent::Done { .. } => Some(PROGRESS_DONE),
            ProgressEvent::Error { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProgressEvent::Processing { message, .. } => message,
            ProgressEvent::Done { payload } => payload,
            ProgressEvent::Error { message } => message,
        }
    }

    /// Flatten into the wire shape.
    pub fn to_update(&self) -> ProgressUpdate {
        ProgressUpdate {
            status: self.status(),
            message: self.message().to_string(),
            progress: self.percent().unwrap_or(0),
        }
    }
}

impl From<&ProgressEvent> for ProgressUpdate {
    fn from(event: &ProgressEvent) -> Self {
        event.to_update()
    }
}

/// Wire representation of a progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub message: String,
    pub progress: u8,
}
