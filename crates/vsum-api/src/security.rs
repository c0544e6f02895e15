//! Input validation for source URLs and free-text prompts.
//!
//! Source URLs are handed to yt-dlp, so they are checked against a domain
//! allow-list and internal-address patterns before any job is admitted.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use url::Url;
use vsum_models::MAX_INSTRUCTIONS_LENGTH;

/// Maximum accepted source URL length.
pub const MAX_URL_LENGTH: usize = 2048;

/// Video platforms yt-dlp is allowed to fetch from.
static ALLOWED_DOMAINS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "youtube.com",
        "www.youtube.com",
        "m.youtube.com",
        "music.youtube.com",
        "youtu.be",
        "vimeo.com",
        "player.vimeo.com",
        "loom.com",
        "dailymotion.com",
        "tiktok.com",
        "twitter.com",
        "x.com",
        "twitch.tv",
        "clips.twitch.tv",
        "streamable.com",
        "soundcloud.com",
    ])
});

/// Internal ranges and cloud metadata endpoints.
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https?://127\.",
        r"^https?://localhost",
        r"^https?://0\.0\.0\.0",
        r"^https?://10\.",
        r"^https?://172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"^https?://192\.168\.",
        r"^https?://169\.254\.",
        r"^https?://\[::1\]",
        r"^https?://\[f[cd]",
        r"^https?://\[fe80",
        r"^https?://metadata\.",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Outcome of source URL validation.
#[derive(Debug, PartialEq, Eq)]
pub enum UrlValidationResult {
    /// URL is acceptable; carries the trimmed URL.
    Valid(String),
    Missing,
    TooLong,
    /// Malformed or non-HTTP(S).
    Invalid(String),
    /// Targets an internal or metadata address.
    Blocked,
    DomainNotAllowed(String),
}

impl UrlValidationResult {
    /// Convert to a `Result` carrying a caller-facing message.
    pub fn into_result(self) -> Result<String, String> {
        match self {
            Self::Valid(url) => Ok(url),
            Self::Missing => Err("URL is required".to_string()),
            Self::TooLong => Err(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )),
            Self::Invalid(msg) => Err(msg),
            Self::Blocked => {
                Err("URL appears to target an internal or restricted endpoint".to_string())
            }
            Self::DomainNotAllowed(domain) => Err(format!(
                "Domain '{}' is not allowed. Please use a supported video platform.",
                domain
            )),
        }
    }
}

/// Validate a source URL: length, scheme, blocked hosts, then allow-list.
pub fn validate_video_url(url: &str) -> UrlValidationResult {
    let url = url.trim();
    if url.is_empty() {
        return UrlValidationResult::Missing;
    }
    if url.len() > MAX_URL_LENGTH {
        return UrlValidationResult::TooLong;
    }

    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(e) => return UrlValidationResult::Invalid(format!("Invalid URL format: {}", e)),
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return UrlValidationResult::Invalid(format!(
            "Invalid protocol '{}'. Only HTTP and HTTPS are allowed.",
            parsed.scheme()
        ));
    }

    let lowered = url.to_lowercase();
    if BLOCKED_PATTERNS.iter().any(|p| p.is_match(&lowered)) {
        warn!(url = %url, "Blocked URL pattern detected");
        return UrlValidationResult::Blocked;
    }

    let Some(domain) = parsed.host_str().map(str::to_lowercase) else {
        return UrlValidationResult::Invalid("URL must have a valid domain".to_string());
    };

    if !is_domain_allowed(&domain) {
        return UrlValidationResult::DomainNotAllowed(domain);
    }

    UrlValidationResult::Valid(url.to_string())
}

/// A domain is allowed if it or its registrable parent is listed.
fn is_domain_allowed(domain: &str) -> bool {
    if ALLOWED_DOMAINS.contains(domain) {
        return true;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    parts.len() > 2 && {
        let parent = parts[parts.len() - 2..].join(".");
        ALLOWED_DOMAINS.contains(parent.as_str())
    }
}

/// Strip control characters (except newline and tab) and cap the length.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_INSTRUCTIONS_LENGTH)
        .collect()
}
