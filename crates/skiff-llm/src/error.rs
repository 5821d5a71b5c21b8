//! Error types for the LLM crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limit Info
// ─────────────────────────────────────────────────────────────────────────────

/// Information about a rate limit error.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitInfo {
    /// The error message from the provider.
    pub message: String,
    /// How long to wait before retrying (if the provider specified).
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Create a new rate limit info with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Build rate limit info from the provider message and `retry-after` header.
    pub fn from_response(message: &str, retry_after_header: Option<&str>) -> Self {
        Self {
            message: message.to_string(),
            retry_after: retry_after_header.and_then(parse_retry_after_header),
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.retry_after {
            Some(d) => write!(f, "{} (retry after {:.1}s)", self.message, d.as_secs_f64()),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Parse a `retry-after` header value expressed in (possibly fractional) seconds.
fn parse_retry_after_header(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Error
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for LLM operations.
///
/// Cloneable so a terminal stream error can be carried inside a
/// [`StreamEvent`](crate::StreamEvent).
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Backend/API error from the provider.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Network/connectivity error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (API key missing, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Wire stream could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(RateLimitInfo),

    /// Authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The turn was cancelled by the caller.
    #[error("Stream cancelled")]
    Cancelled,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Create a rate limit error from a message string.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(RateLimitInfo::new(message))
    }

    /// Get the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(info) => info.retry_after,
            _ => None,
        }
    }

    /// Returns true if this error came from caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after_header() {
        assert_eq!(parse_retry_after_header("2"), Some(Duration::from_secs(2)));
        assert_eq!(
            parse_retry_after_header(" 1.5 "),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(parse_retry_after_header("soon"), None);
        assert_eq!(parse_retry_after_header("-1"), None);
    }

    #[test]
    fn test_rate_limit_info_display() {
        let info = RateLimitInfo::from_response("slow down", Some("3"));
        assert_eq!(info.to_string(), "slow down (retry after 3.0s)");

        let info = RateLimitInfo::new("slow down");
        assert_eq!(info.to_string(), "slow down");
    }

    #[test]
    fn test_llm_error_retry_after() {
        let err = LlmError::RateLimit(RateLimitInfo::from_response("x", Some("4")));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(4)));
        assert_eq!(LlmError::Backend("x".into()).retry_after(), None);
    }

    #[test]
    fn test_cancelled() {
        assert!(LlmError::Cancelled.is_cancelled());
        assert!(!LlmError::Network("reset".into()).is_cancelled());
        assert_eq!(LlmError::Cancelled.to_string(), "Stream cancelled");
    }
}
