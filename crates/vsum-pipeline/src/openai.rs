//! OpenAI-backed transcription and summarization.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vsum_media::MediaHandle;

use crate::config::OpenAiConfig;
use crate::error::BackendError;
use crate::stages::{Summarizer, SummaryOptions, Transcriber};

/// OpenAI API client.
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// System prompt asking for a summary of about `options.word_budget` words.
pub fn build_summary_prompt(options: &SummaryOptions) -> String {
    let mut prompt = format!(
        "You summarize video transcripts. Write a clear, well-structured summary \
         of about {} words that captures the main points and key takeaways. \
         Respond with the summary only.",
        options.word_budget
    );

    if let Some(instructions) = options.instructions.as_deref() {
        let instructions = instructions.trim();
        if !instructions.is_empty() {
            prompt.push_str("\n\nAdditional instructions: ");
            prompt.push_str(instructions);
        }
    }

    prompt
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, media: &MediaHandle) -> Result<String, BackendError> {
        let bytes = tokio::fs::read(media.path()).await?;
        let file_name = media
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        info!(
            file = %file_name,
            size_bytes = media.size_bytes(),
            model = %self.config.transcription_model,
            "Requesting transcription"
        );

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;
        let form = Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(e.to_string()))?;

        debug!(chars = body.text.len(), "Transcription received");
        Ok(body.text)
    }
}

#[async_trait]
impl Summarizer for OpenAiClient {
    async fn summarize(
        &self,
        transcript: &str,
        options: &SummaryOptions,
    ) -> Result<String, BackendError> {
        let system = build_summary_prompt(options);
        let request = ChatRequest {
            model: &self.config.summary_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: transcript,
                },
            ],
        };

        info!(
            model = %self.config.summary_model,
            word_budget = options.word_budget,
            "Requesting summary"
        );

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BackendError::invalid_response("No content in completion"))
    }
}
