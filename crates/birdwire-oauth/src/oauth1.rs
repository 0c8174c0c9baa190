//! OAuth 1.0a signature engine.
//!
//! Pure functions: the same URL, method, parameters and secrets always give
//! the same signature and header. Nonce and timestamp generation live here
//! too but are only called by the request factory.

use std::collections::BTreeMap;
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use rand::Rng;
use reqwest::Method;
use sha1::Sha1;
use url::Url;

use crate::{OAuthError, OAuthResult};

/// Everything except the RFC 3986 unreserved characters:
/// ALPHA / DIGIT / "-" / "." / "_" / "~"
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_RANGE: Range<u64> = 123_400..9_999_999;

/// A protocol parameter taking part in request signing.
///
/// The three flags are independent: the signature base string is built from
/// the parameters with `required_for_signature`, the header from those with
/// `required_for_header`, and the signing key from those with
/// `part_of_secret_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthParameter {
    /// Parameter name, e.g. `oauth_nonce`.
    pub key: String,
    /// Unencoded value.
    pub value: String,
    /// Included in the signature base string.
    pub required_for_signature: bool,
    /// Rendered in the `Authorization` header.
    pub required_for_header: bool,
    /// Contributes to the HMAC signing key.
    pub part_of_secret_key: bool,
}

impl OAuthParameter {
    /// Create a parameter with explicit flags.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        required_for_signature: bool,
        required_for_header: bool,
        part_of_secret_key: bool,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            required_for_signature,
            required_for_header,
            part_of_secret_key,
        }
    }

    /// A parameter that is both signed and sent in the header.
    #[must_use]
    pub fn protocol(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value, true, true, false)
    }

    /// A secret that only feeds the signing key.
    #[must_use]
    pub fn secret(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value, false, false, true)
    }
}

/// Compute the percent-encoded HMAC-SHA1 signature of a request.
///
/// `url_parameters` are the request's own query (and form body) parameters;
/// any query string left on `url` is stripped from the base URL and is not
/// re-read here.
pub fn signature(
    url: &str,
    method: &Method,
    parameters: &[OAuthParameter],
    url_parameters: &BTreeMap<String, String>,
) -> OAuthResult<String> {
    let base_url = base_url(url)?;

    let mut pairs: Vec<(String, String)> = url_parameters
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    pairs.extend(
        parameters
            .iter()
            .filter(|p| p.required_for_signature)
            .map(|p| (percent_encode(&p.key), percent_encode(&p.value))),
    );
    pairs.sort();

    let parameter_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.as_str().to_uppercase(),
        percent_encode(&base_url),
        percent_encode(&parameter_string)
    );

    let digest = hmac_sha1(&signing_key(parameters), &base_string)?;
    Ok(percent_encode(&digest))
}

/// Build the `Authorization` header value for a request.
///
/// Renders `OAuth k1="v1",k2="v2",...` over the header parameters plus
/// `oauth_signature`, sorted by key.
pub fn authorization_header(
    url: &str,
    method: &Method,
    parameters: &[OAuthParameter],
    url_parameters: &BTreeMap<String, String>,
) -> OAuthResult<String> {
    let signature = signature(url, method, parameters, url_parameters)?;

    let mut fields: Vec<(&str, String)> = parameters
        .iter()
        .filter(|p| p.required_for_header)
        .map(|p| (p.key.as_str(), percent_encode(&p.value)))
        .collect();
    // Already percent-encoded by `signature`.
    fields.push(("oauth_signature", signature));
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let rendered = fields
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(",");

    Ok(format!("OAuth {rendered}"))
}

/// Extract the decoded query parameters of a URL, ordered by key.
#[must_use]
pub fn query_parameters(url: &Url) -> BTreeMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Render parameters as an `application/x-www-form-urlencoded` body using
/// the OAuth encode set, so the body matches what was signed.
#[must_use]
pub fn form_encode(parameters: &BTreeMap<String, String>) -> String {
    parameters
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode a string per RFC 3986 (upper-case hex).
#[must_use]
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Reverse [`percent_encode`]. Invalid UTF-8 is replaced lossily.
#[must_use]
pub fn percent_decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Generate a nonce: a random integer, fresh per request.
#[must_use]
pub fn generate_nonce() -> String {
    rand::thread_rng().gen_range(NONCE_RANGE).to_string()
}

/// Seconds since the Unix epoch (UTC).
pub fn unix_timestamp() -> OAuthResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| OAuthError::Clock(e.to_string()))
}

/// Base URL for the signature base string: scheme, authority and path.
fn base_url(url: &str) -> OAuthResult<String> {
    let mut parsed = Url::parse(url)?;

    if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
        return Err(OAuthError::InvalidUrl(format!("{url} has no host")));
    }
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(OAuthError::InvalidUrl(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }

    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

/// `encode(consumer_secret)&encode(token_secret)`, from the secret-key
/// parameters sorted by key.
fn signing_key(parameters: &[OAuthParameter]) -> String {
    let mut secrets: Vec<&OAuthParameter> =
        parameters.iter().filter(|p| p.part_of_secret_key).collect();
    secrets.sort_by(|a, b| a.key.cmp(&b.key));

    secrets
        .iter()
        .map(|p| percent_encode(&p.value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Compute HMAC-SHA1 and return the base64-encoded digest.
fn hmac_sha1(key: &str, data: &str) -> OAuthResult<String> {
    type HmacSha1 = Hmac<Sha1>;

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| OAuthError::SignatureError(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
