//! Twitter connector configuration.

use std::time::Duration;

use birdwire_oauth::{Credentials, Token};
use serde::{Deserialize, Serialize};

use crate::error::{TwitterError, TwitterResult};

/// Path of the plain sample feed, relative to `stream_url`.
pub const SAMPLE_PATH: &str = "/1.1/statuses/sample.json";

/// Path of the keyword-filtered feed, relative to `stream_url`.
pub const FILTER_PATH: &str = "/1.1/statuses/filter.json";

/// Configuration for the Twitter connector.
#[derive(Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// OAuth 1.0a Consumer Key (API Key)
    pub consumer_key: String,

    /// OAuth 1.0a Consumer Secret (API Secret)
    pub consumer_secret: String,

    /// OAuth 1.0a Access Token. Empty while credentials are being issued.
    #[serde(default)]
    pub access_token: String,

    /// OAuth 1.0a Access Token Secret
    #[serde(default)]
    pub access_token_secret: String,

    /// Base URL for REST calls (default: https://api.twitter.com)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL for the streaming endpoints (default: https://stream.twitter.com)
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// Timeout for one-shot REST requests. Streams never time out.
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Timeout for establishing a connection
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
}

fn default_api_url() -> String {
    "https://api.twitter.com".into()
}

fn default_stream_url() -> String {
    "https://stream.twitter.com".into()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            api_url: default_api_url(),
            stream_url: default_stream_url(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl std::fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("stream_url", &self.stream_url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl TwitterConfig {
    /// Load configuration from `TWITTER_*` environment variables.
    ///
    /// The consumer key and secret are required. The access token pair may
    /// be absent, which leaves the config in the credential-issuance phase.
    pub fn from_env() -> TwitterResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TwitterResult<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| TwitterError::Config(format!("{name} is not set")))
        };

        let mut config = Self {
            consumer_key: required("TWITTER_CONSUMER_KEY")?,
            consumer_secret: required("TWITTER_CONSUMER_SECRET")?,
            access_token: lookup("TWITTER_ACCESS_TOKEN").unwrap_or_default(),
            access_token_secret: lookup("TWITTER_ACCESS_TOKEN_SECRET").unwrap_or_default(),
            ..Self::default()
        };
        if let Some(url) = lookup("TWITTER_STREAM_URL") {
            config.stream_url = url;
        }
        if let Some(url) = lookup("TWITTER_API_URL") {
            config.api_url = url;
        }
        Ok(config)
    }

    /// Point both base URLs at one host. Handy for tests.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.api_url.clone_from(&url);
        self.stream_url = url;
        self
    }

    /// The credential set to sign with.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            &self.consumer_key,
            &self.consumer_secret,
            &self.access_token,
            &self.access_token_secret,
        )
    }

    /// Build a signing token with an HTTP client configured from this config.
    pub fn token(&self) -> TwitterResult<Token> {
        let client = reqwest::Client::builder()
            .user_agent(format!("birdwire-twitter/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.connect_timeout)
            .build()?;

        Ok(Token::with_http_client(self.credentials(), client).with_request_timeout(self.timeout))
    }

    /// URL of the plain sample feed.
    #[must_use]
    pub fn sample_url(&self) -> String {
        format!("{}{SAMPLE_PATH}", self.stream_url.trim_end_matches('/'))
    }

    /// URL of the keyword-filtered feed.
    #[must_use]
    pub fn filter_url(&self) -> String {
        format!("{}{FILTER_PATH}", self.stream_url.trim_end_matches('/'))
    }

    /// URL of a REST endpoint, e.g. `api_endpoint("/1.1/account/verify_credentials.json")`.
    #[must_use]
    pub fn api_endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_url.trim_end_matches('/'))
    }
}
