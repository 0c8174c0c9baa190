//! Credential set and signed request factory.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Request};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    OAUTH_VERSION, OAuthError, OAuthParameter, OAuthResult, SIGNATURE_METHOD,
    authorization_header, form_encode, generate_nonce, query_parameters, unix_timestamp,
};

/// Default timeout for one-shot requests made through [`Token::execute_get`]
/// and [`Token::execute_post`]. Streaming requests carry no timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Consumer and access credentials. Immutable once handed to a [`Token`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_token_secret: String,
}

impl Credentials {
    /// Create a full credential set.
    #[must_use]
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    /// Consumer-only credentials, used while an access token is being issued.
    #[must_use]
    pub fn consumer_only(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self::new(consumer_key, consumer_secret, "", "")
    }

    /// Access token (empty during issuance).
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The full protocol parameter set for one request, minus the signature.
    ///
    /// Pure: fixed `nonce` and `timestamp` give a fixed result.
    #[must_use]
    pub fn protocol_parameters(&self, nonce: &str, timestamp: u64) -> Vec<OAuthParameter> {
        let mut params = vec![
            OAuthParameter::protocol("oauth_consumer_key", &self.consumer_key),
            OAuthParameter::protocol("oauth_nonce", nonce),
            OAuthParameter::protocol("oauth_signature_method", SIGNATURE_METHOD),
            OAuthParameter::protocol("oauth_timestamp", timestamp.to_string()),
            OAuthParameter::protocol("oauth_version", OAUTH_VERSION),
            OAuthParameter::secret("oauth_consumer_secret", &self.consumer_secret),
            OAuthParameter::secret("oauth_token_secret", &self.access_token_secret),
        ];

        if !self.access_token.is_empty() {
            params.push(OAuthParameter::protocol("oauth_token", &self.access_token));
        }

        params
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}

/// Request factory: owns the credentials and an HTTP client, and produces
/// signed requests ready to execute.
#[derive(Debug, Clone)]
pub struct Token {
    credentials: Credentials,
    client: Client,
    request_timeout: Duration,
}

impl Token {
    /// Create a token with a fresh HTTP client.
    ///
    /// The client has no overall timeout so it can carry long-lived streams.
    pub fn new(credentials: Credentials) -> OAuthResult<Self> {
        let client = Client::builder()
            .user_agent(format!("birdwire/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self::with_http_client(credentials, client))
    }

    /// Create with a custom HTTP client.
    #[must_use]
    pub const fn with_http_client(credentials: Credentials, client: Client) -> Self {
        Self {
            credentials,
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the timeout applied by the execute helpers.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The credentials this token signs with.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The HTTP client requests should be executed on.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Build a signed request.
    ///
    /// `extra_parameters` are signed together with the URL's own query. For
    /// `GET` they are appended to the query string; otherwise they become a
    /// form-encoded body.
    #[instrument(skip(self, extra_parameters))]
    pub fn build_signed_request(
        &self,
        url: &str,
        method: Method,
        extra_parameters: Option<&BTreeMap<String, String>>,
    ) -> OAuthResult<Request> {
        let empty = BTreeMap::new();
        let extra = extra_parameters.unwrap_or(&empty);

        let mut target = Url::parse(url)?;
        let mut url_parameters = query_parameters(&target);
        url_parameters.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let header = self.authorization_header_for(url, &method, &url_parameters)?;

        let body = if method == Method::GET {
            if !extra.is_empty() {
                target.query_pairs_mut().extend_pairs(extra.iter());
            }
            None
        } else if extra.is_empty() {
            None
        } else {
            Some(form_encode(extra))
        };

        let mut builder = self
            .client
            .request(method, target)
            .header(AUTHORIZATION, header);
        if let Some(body) = body {
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body);
        }

        let request = builder.build()?;
        debug!(url = %request.url(), "Built signed request");
        Ok(request)
    }

    /// Execute a signed GET and decode the JSON response.
    pub async fn execute_get(&self, url: &str) -> OAuthResult<serde_json::Value> {
        let request = self.build_signed_request(url, Method::GET, None)?;
        self.execute(request).await
    }

    /// Execute a signed form POST and decode the JSON response.
    pub async fn execute_post(
        &self,
        url: &str,
        parameters: &BTreeMap<String, String>,
    ) -> OAuthResult<serde_json::Value> {
        let request = self.build_signed_request(url, Method::POST, Some(parameters))?;
        self.execute(request).await
    }

    async fn execute(&self, mut request: Request) -> OAuthResult<serde_json::Value> {
        *request.timeout_mut() = Some(self.request_timeout);

        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    fn authorization_header_for(
        &self,
        url: &str,
        method: &Method,
        url_parameters: &BTreeMap<String, String>,
    ) -> OAuthResult<String> {
        let nonce = generate_nonce();
        let timestamp = unix_timestamp()?;
        let parameters = self.credentials.protocol_parameters(&nonce, timestamp);
        authorization_header(url, method, &parameters, url_parameters)
    }
}
