//! YouTube cookie file handling for yt-dlp.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Minimum size for a valid cookies file (bytes).
/// A real Netscape cookies file is at least ~50 bytes.
const MIN_COOKIES_FILE_SIZE: u64 = 50;

/// File name of the per-job writable copy.
const JOB_COOKIES_FILE: &str = "cookies.txt";

/// Validate that a cookies file appears to be in Netscape format.
///
/// Netscape cookies files either start with "# Netscape HTTP Cookie File"
/// or contain tab-separated lines with domain entries.
pub fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File")
        || content.starts_with("# HTTP Cookie File")
    {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 6)
}

/// Copy a validated cookies file into `dest_dir` and return the copy's path.
///
/// yt-dlp writes cookies back after use, so each job gets its own copy that
/// disappears with the job's working area. Returns `None` when the source
/// is missing, too small or not in Netscape format.
pub async fn prepare_cookies(source: &Path, dest_dir: &Path) -> Option<PathBuf> {
    let metadata = match tokio::fs::metadata(source).await {
        Ok(m) => m,
        Err(_) => {
            debug!(path = %source.display(), "Cookies file not found, skipping");
            return None;
        }
    };

    if metadata.len() < MIN_COOKIES_FILE_SIZE {
        debug!(
            path = %source.display(),
            size = metadata.len(),
            "Cookies file is too small, skipping"
        );
        return None;
    }

    match tokio::fs::read_to_string(source).await {
        Ok(content) if is_valid_netscape_cookies(&content) => {}
        Ok(_) => {
            debug!(path = %source.display(), "Cookies file is not in Netscape format, skipping");
            return None;
        }
        Err(e) => {
            warn!("Failed to read cookies file: {}", e);
            return None;
        }
    }

    let dest = dest_dir.join(JOB_COOKIES_FILE);
    if let Err(e) = tokio::fs::copy(source, &dest).await {
        warn!("Failed to copy cookies file into working area: {}", e);
        return None;
    }

    info!("Using cookies file for YouTube authentication");
    Some(dest)
}
