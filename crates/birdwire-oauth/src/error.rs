//! OAuth error types.

/// OAuth errors.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// URL could not be used as a signing target.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// URL parsing failed.
    #[error("URL parsing failed: {0}")]
    UrlError(#[from] url::ParseError),

    /// OAuth 1.0a signature error.
    #[error("OAuth 1.0a signature error: {0}")]
    SignatureError(String),

    /// System clock is unusable for timestamps.
    #[error("Clock error: {0}")]
    Clock(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The remote API answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Result type for OAuth operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
