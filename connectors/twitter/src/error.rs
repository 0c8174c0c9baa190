//! Twitter-specific error types.

use birdwire_oauth::OAuthError;
use birdwire_streaming::StreamError;
use thiserror::Error;

/// Twitter-specific errors.
#[derive(Error, Debug)]
pub enum TwitterError {
    /// Signing or executing a signed request failed
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// The stream could not be started or opened
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// HTTP client construction failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TwitterError {
    /// Whether restarting the stream might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Stream(StreamError::HttpError { status, .. })
            | Self::OAuth(OAuthError::Api { status, .. }) => *status >= 500 || *status == 429,
            Self::Stream(StreamError::ConnectionFailed(_) | StreamError::ReqwestError(_))
            | Self::OAuth(OAuthError::HttpError(_)) => true,
            _ => false,
        }
    }
}

/// Result type for Twitter operations.
pub type TwitterResult<T> = Result<T, TwitterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let server = TwitterError::Stream(StreamError::HttpError {
            status: 503,
            message: "unavailable".into(),
        });
        let limited = TwitterError::OAuth(OAuthError::Api {
            status: 429,
            body: String::new(),
        });
        let unauthorized = TwitterError::Stream(StreamError::HttpError {
            status: 401,
            message: "unauthorized".into(),
        });

        assert!(server.is_retryable());
        assert!(limited.is_retryable());
        assert!(!unauthorized.is_retryable());
    }

    #[test]
    fn test_configuration_errors_are_final() {
        assert!(!TwitterError::Config("missing key".into()).is_retryable());
        assert!(!TwitterError::Stream(StreamError::AlreadyRunning).is_retryable());
        assert!(!TwitterError::Stream(StreamError::NoHandler).is_retryable());
    }

    #[test]
    fn test_display_wraps_source() {
        let err = TwitterError::from(StreamError::AlreadyRunning);
        assert!(err.to_string().starts_with("Stream error:"));
    }
}
