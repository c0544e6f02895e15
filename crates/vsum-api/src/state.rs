//! Application state.

use std::sync::Arc;

use vsum_media::{YtDlpConfig, YtDlpSource};
use vsum_pipeline::{
    OpenAiClient, OpenAiConfig, Pipeline, PipelineConfig, PipelineError, SummaryService,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<SummaryService>,
    /// Used directly for metadata lookups, outside admission control.
    pub media: Arc<YtDlpSource>,
}

impl AppState {
    /// Wire the production backends from the environment.
    pub fn from_env(config: ApiConfig) -> Result<Self, PipelineError> {
        let media = Arc::new(YtDlpSource::new(YtDlpConfig::from_env()));
        let openai = Arc::new(
            OpenAiClient::new(OpenAiConfig::from_env()?)
                .map_err(|e| PipelineError::config_error(e.to_string()))?,
        );

        let pipeline = Pipeline::new(
            media.clone(),
            openai.clone(),
            openai,
            PipelineConfig::from_env(),
        );

        Ok(Self::new(config, SummaryService::new(pipeline), media))
    }

    pub fn new(config: ApiConfig, service: SummaryService, media: Arc<YtDlpSource>) -> Self {
        Self {
            config,
            service: Arc::new(service),
            media,
        }
    }
}
