//! Audio acquisition using yt-dlp.
//!
//! Downloads the audio track of a source URL into a job's working area and
//! hands back a [`MediaHandle`] for it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cookies::prepare_cookies;
use crate::error::{MediaError, MediaResult};
use crate::handle::MediaHandle;

/// yt-dlp configuration.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// yt-dlp executable (name on PATH or absolute path)
    pub binary: String,
    /// Optional ffmpeg location passed to yt-dlp
    pub ffmpeg_path: Option<String>,
    /// Optional Netscape cookies file for authenticated downloads
    pub cookies_path: Option<PathBuf>,
    /// Audio container produced by the extraction
    pub audio_format: String,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            ffmpeg_path: None,
            cookies_path: None,
            audio_format: "mp3".to_string(),
        }
    }
}

impl YtDlpConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            binary: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            ffmpeg_path: std::env::var("FFMPEG_PATH").ok().filter(|s| !s.is_empty()),
            cookies_path: std::env::var("YOUTUBE_COOKIES_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            audio_format: "mp3".to_string(),
        }
    }
}

/// Derive a filesystem-safe file stem from a source reference.
///
/// Uses the last path segment and replaces anything that is not ASCII
/// alphanumeric with `_`.
pub fn source_file_stem(source_ref: &str) -> String {
    let last = source_ref
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let stem: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if stem.is_empty() {
        "media".to_string()
    } else {
        stem
    }
}

/// Map yt-dlp stderr to a caller-facing error.
pub fn classify_failure(stderr: &str) -> MediaError {
    if stderr.contains("Sign in") || stderr.contains("cookie") || stderr.contains("Private video") {
        return MediaError::AuthenticationRequired;
    }

    let last_line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown error");

    MediaError::download_failed(format!("Failed to download video: {}", last_line))
}

/// Media source backed by yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    config: YtDlpConfig,
}

impl YtDlpSource {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YtDlpConfig {
        &self.config
    }

    /// Resolve the yt-dlp executable.
    pub fn locate_binary(&self) -> MediaResult<PathBuf> {
        which::which(&self.config.binary)
            .map_err(|_| MediaError::YtDlpNotFound(self.config.binary.clone()))
    }

    /// Download the audio of `source_ref` into `dest_dir`.
    ///
    /// The child process is killed if the returned future is dropped, so
    /// cancelling a job stops the download.
    pub async fn download_audio(&self, source_ref: &str, dest_dir: &Path) -> MediaResult<MediaHandle> {
        let binary = self.locate_binary()?;
        let stem = source_file_stem(source_ref);
        let output_template = dest_dir.join(format!("{}.%(ext)s", stem));
        let expected = dest_dir.join(format!("{}.{}", stem, self.config.audio_format));

        info!(url = %source_ref, dest = %dest_dir.display(), "Downloading audio");

        let mut cmd = Command::new(&binary);
        cmd.arg("--extract-audio")
            .arg("--audio-format")
            .arg(&self.config.audio_format)
            .arg("--prefer-free-formats")
            .arg("--no-playlist")
            .arg("--output")
            .arg(&output_template);

        if let Some(ffmpeg) = &self.config.ffmpeg_path {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }

        if let Some(source) = &self.config.cookies_path {
            if let Some(cookies) = prepare_cookies(source, dest_dir).await {
                cmd.arg("--cookies").arg(cookies);
            }
        }

        let output = cmd
            .arg(source_ref)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            let err = classify_failure(&stderr);
            warn!(url = %source_ref, error = %err, "yt-dlp download failed");
            return Err(err);
        }

        if !expected.exists() {
            return Err(MediaError::FileNotFound(expected));
        }

        let handle = MediaHandle::from_file(&expected).await?;
        info!(
            output = %expected.display(),
            size_mb = handle.size_bytes() as f64 / (1024.0 * 1024.0),
            "Downloaded audio successfully"
        );

        Ok(handle)
    }
}
