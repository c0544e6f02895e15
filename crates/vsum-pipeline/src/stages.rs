//! Stage capabilities the orchestrator drives.
//!
//! Each stage is an opaque, possibly slow, possibly failing operation. The
//! orchestrator only depends on these traits; production wiring plugs in
//! [`YtDlpSource`], [`UploadSource`] and [`crate::openai::OpenAiClient`].

use async_trait::async_trait;
use vsum_media::{MediaHandle, MediaResult, ResourceScope, UploadSource, YtDlpSource};

use crate::error::BackendError;

/// Summarizer parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Target summary length in words
    pub word_budget: u32,
    /// Extra steering instructions
    pub instructions: Option<String>,
}

/// Fetches media for a source reference into a job's working area.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, source_ref: &str, scope: &ResourceScope) -> MediaResult<MediaHandle>;

    /// Delete acquired media. Must be idempotent.
    async fn release(&self, media: &MediaHandle) -> MediaResult<()> {
        media.release().await.map(|_| ())
    }

    /// Drop source material for a job that failed before acquiring it.
    async fn discard(&self, _source_ref: &str) -> MediaResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media: &MediaHandle) -> Result<String, BackendError>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        transcript: &str,
        options: &SummaryOptions,
    ) -> Result<String, BackendError>;
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn acquire(&self, source_ref: &str, scope: &ResourceScope) -> MediaResult<MediaHandle> {
        self.download_audio(source_ref, scope.path()).await
    }
}

#[async_trait]
impl MediaSource for UploadSource {
    async fn acquire(&self, source_ref: &str, scope: &ResourceScope) -> MediaResult<MediaHandle> {
        self.accept(source_ref, scope.path()).await
    }

    async fn discard(&self, source_ref: &str) -> MediaResult<()> {
        UploadSource::discard(self, source_ref).await.map(|_| ())
    }
}
