//! Video metadata handler.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use vsum_media::VideoInfo;

use crate::error::{ApiError, ApiResult};
use crate::security::validate_video_url;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    pub data: VideoInfo,
}

/// `GET /api/info`
///
/// Not admission controlled: a metadata lookup downloads no media.
pub async fn get_video_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> ApiResult<Json<InfoResponse>> {
    let url = validate_video_url(query.url.as_deref().unwrap_or_default())
        .into_result()
        .map_err(ApiError::Validation)?;

    let data = state.media.fetch_video_info(&url).await?;
    info!(url = %url, video_id = %data.id, "Video info retrieved");

    Ok(Json(InfoResponse {
        success: true,
        data,
    }))
}
