//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use vsum_models::DEFAULT_SUMMARY_WORDS;

use crate::error::{PipelineError, PipelineResult};

/// Job pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum concurrently running jobs (admission capacity)
    pub max_concurrent_jobs: usize,
    /// Root directory under which per-job working areas are created
    pub work_dir: PathBuf,
    /// Capacity of each job's progress buffer
    pub progress_buffer: usize,
    /// Word budget used when a request does not specify one
    pub default_words: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: PathBuf::from("./tmp"),
            progress_buffer: 16,
            default_words: DEFAULT_SUMMARY_WORDS,
        }
    }
}

impl PipelineConfig {
    /// Directory uploads are staged in before a job picks them up.
    pub fn upload_dir(&self) -> PathBuf {
        self.work_dir.join("uploads")
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2usize)
                .max(1),
            work_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./tmp")),
            progress_buffer: std::env::var("PROGRESS_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16usize)
                .max(2),
            default_words: std::env::var("DEFAULT_SUMMARY_WORDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SUMMARY_WORDS),
        }
    }
}

/// OpenAI backend configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub transcription_model: String,
    pub summary_model: String,
    /// HTTP client timeout
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            summary_model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(600),
        }
    }

    /// Create config from environment variables.
    ///
    /// `OPENAI_API_KEY` is required.
    pub fn from_env() -> PipelineResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PipelineError::config_error("OPENAI_API_KEY not set"))?;

        let defaults = Self::new(api_key);
        Ok(Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url.clone()),
            transcription_model: std::env::var("OPENAI_TRANSCRIPTION_MODEL")
                .unwrap_or(defaults.transcription_model.clone()),
            summary_model: std::env::var("OPENAI_SUMMARY_MODEL")
                .unwrap_or(defaults.summary_model.clone()),
            timeout: std::env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            ..defaults
        })
    }
}
