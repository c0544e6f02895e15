//! Video metadata lookup via `yt-dlp --dump-single-json`.

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

use crate::download::{classify_failure, YtDlpSource};
use crate::error::MediaResult;

/// Metadata about a remote video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub channel: Option<String>,
    /// Duration in seconds
    pub duration: Option<u64>,
}

/// Subset of the yt-dlp info JSON we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
    thumbnail: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
}

impl From<YtDlpInfo> for VideoInfo {
    fn from(raw: YtDlpInfo) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            description: raw.description,
            thumbnail_url: raw.thumbnail,
            channel: raw.channel.or(raw.uploader),
            duration: raw.duration.map(|d| d.max(0.0).round() as u64),
        }
    }
}

/// Parse yt-dlp's JSON dump.
pub fn parse_video_info(json: &str) -> MediaResult<VideoInfo> {
    let raw: YtDlpInfo = serde_json::from_str(json)?;
    Ok(raw.into())
}

impl YtDlpSource {
    /// Fetch metadata for `url` without downloading media.
    pub async fn fetch_video_info(&self, url: &str) -> MediaResult<VideoInfo> {
        let binary = self.locate_binary()?;
        info!(url = %url, "Fetching video info");

        let output = Command::new(&binary)
            .args(["--dump-single-json", "--skip-download", "--no-playlist"])
            .arg(url)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        parse_video_info(&String::from_utf8_lossy(&output.stdout))
    }
}
