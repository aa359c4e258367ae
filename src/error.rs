//! Error types for the sync pipeline.

use std::time::Duration;

/// Errors that can occur while talking to the generative backend.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Operation exceeded its configured deadline (video polling).
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (e.g., saving media to disk).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Video generation job reported a failure.
    #[error("video generation failed: {0}")]
    VideoGeneration(String),

    /// Response was well-formed HTTP but not the shape we expect.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl SyncError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Reads a `Retry-After` header as whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Truncates an error body so huge HTML/JSON payloads don't flood messages.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    const MAX: usize = 600;
    let trimmed = text.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut cut = MAX;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}

/// Maps a non-success response from the generative API to a typed error.
///
/// All three endpoints (text, image, video job) live on the same API
/// surface and share status semantics, so classification is centralized.
pub(crate) fn classify_http_error(
    status: u16,
    text: &str,
    headers: &reqwest::header::HeaderMap,
) -> SyncError {
    let text = sanitize_error_message(text);
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return SyncError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return SyncError::Auth(text);
    }
    if status == 404 {
        return SyncError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return SyncError::ContentBlocked(text);
    }
    SyncError::Api {
        status,
        message: text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(SyncError::RateLimited { retry_after: None }.is_retryable());
        assert!(SyncError::Timeout(Duration::from_secs(30)).is_retryable());

        assert!(!SyncError::Auth("bad key".into()).is_retryable());
        assert!(!SyncError::ContentBlocked("nsfw".into()).is_retryable());
        assert!(!SyncError::Decode("bad base64".into()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let rate_limited = SyncError::RateLimited {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

        let rate_limited_no_hint = SyncError::RateLimited { retry_after: None };
        assert_eq!(rate_limited_no_hint.retry_after(), None);

        let auth = SyncError::Auth("bad".into());
        assert_eq!(auth.retry_after(), None);
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = SyncError::ContentBlocked("Safety filter triggered".into());
        assert_eq!(err.to_string(), "content blocked: Safety filter triggered");
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "42".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(42));

        let empty = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&empty), None);
    }

    #[test]
    fn test_sanitize_error_message_truncates() {
        let long = "x".repeat(2000);
        let sanitized = sanitize_error_message(&long);
        assert!(sanitized.len() < 700);
        assert!(sanitized.ends_with("..."));

        assert_eq!(sanitize_error_message("  short  "), "short");
    }

    #[test]
    fn test_classify_http_error() {
        let headers = reqwest::header::HeaderMap::new();

        assert!(matches!(
            classify_http_error(401, "bad key", &headers),
            SyncError::Auth(_)
        ));
        assert!(matches!(
            classify_http_error(429, "slow down", &headers),
            SyncError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_http_error(404, "no such model", &headers),
            SyncError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_http_error(400, "prompt was BLOCKED by policy", &headers),
            SyncError::ContentBlocked(_)
        ));
        assert!(matches!(
            classify_http_error(500, "boom", &headers),
            SyncError::Api { status: 500, .. }
        ));
    }
}
