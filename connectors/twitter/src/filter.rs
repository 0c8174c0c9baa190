//! The keyword-filtered feed.

use std::collections::{BTreeMap, BTreeSet};

use birdwire_oauth::{OAuthResult, Token, form_encode};
use birdwire_streaming::{Flow, StreamEngine};
use parking_lot::Mutex;
use reqwest::{Method, Request};
use tracing::{debug, info, instrument};

use crate::{
    config::TwitterConfig,
    error::TwitterResult,
    stream::{Deletions, TweetStream, always_continue, decoder, signed_connection},
    types::Tweet,
};

/// Statuses matching any tracked keyword, fetched with a signed `POST`.
///
/// The keyword set is read each time a connection is built, so changes take
/// effect on the next reconnect.
#[derive(Debug)]
pub struct FilteredStream {
    engine: StreamEngine,
    url: String,
    tracks: Mutex<BTreeSet<String>>,
}

impl FilteredStream {
    /// Create a stream posting to `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            engine: StreamEngine::new(),
            url: url.into(),
            tracks: Mutex::new(BTreeSet::new()),
        }
    }

    /// Create a stream posting to the configured filter endpoint.
    #[must_use]
    pub fn from_config(config: &TwitterConfig) -> Self {
        Self::new(config.filter_url())
    }

    /// The endpoint this stream posts to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Track keywords
    // ─────────────────────────────────────────────────────────────────────────────

    /// Track a keyword. Returns `false` if it was already tracked or blank.
    pub fn add_track(&self, keyword: impl Into<String>) -> bool {
        let keyword = keyword.into();
        if keyword.trim().is_empty() {
            return false;
        }
        let mut tracks = self.tracks.lock();
        let added = tracks.insert(keyword);
        if added {
            debug!(tracks = tracks.len(), "Track keyword added");
        }
        added
    }

    /// Stop tracking a keyword. Returns `false` if it was not tracked.
    pub fn remove_track(&self, keyword: &str) -> bool {
        self.tracks.lock().remove(keyword)
    }

    /// Stop tracking every keyword.
    pub fn clear_tracks(&self) {
        self.tracks.lock().clear();
    }

    /// Tracked keywords, sorted.
    #[must_use]
    pub fn tracks(&self) -> Vec<String> {
        self.tracks.lock().iter().cloned().collect()
    }

    /// Form parameters for the filter request. Empty when nothing is tracked.
    #[must_use]
    pub fn track_parameters(&self) -> BTreeMap<String, String> {
        let tracks = self.tracks.lock();
        let mut parameters = BTreeMap::new();
        if !tracks.is_empty() {
            let joined = tracks.iter().map(String::as_str).collect::<Vec<_>>().join(",");
            parameters.insert("track".to_string(), joined);
        }
        parameters
    }

    /// The form body the filter request carries, e.g. `track=a%2Cb`.
    #[must_use]
    pub fn request_body(&self) -> String {
        form_encode(&self.track_parameters())
    }

    /// Build the signed filter request for the current keyword set.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint URL is malformed.
    pub fn build_request(&self, token: &Token) -> OAuthResult<Request> {
        filter_request(token, &self.url, &self.track_parameters())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Streaming
    // ─────────────────────────────────────────────────────────────────────────────

    /// Read the feed until `processor` returns [`Flow::Stop`], the stream is
    /// stopped, or the endpoint stops answering.
    ///
    /// # Errors
    ///
    /// Fails if the stream is already running or the first connection
    /// cannot be opened. Failures after that end the stream quietly.
    #[instrument(skip_all, fields(url = %self.url))]
    pub async fn start_stream<P>(&self, token: &Token, processor: P) -> TwitterResult<()>
    where
        P: FnMut(Tweet) -> Flow + Send,
    {
        info!(tracks = ?self.tracks(), "Starting filtered stream");
        self.engine
            .start_stream(Some(decoder(processor, Deletions::Decode)), || {
                let url = self.url.clone();
                let parameters = self.track_parameters();
                Ok(signed_connection(token, move |signer| {
                    filter_request(signer, &url, &parameters)
                }))
            })
            .await?;
        Ok(())
    }

    /// Like [`start_stream`](Self::start_stream), invoking `action` on every
    /// tweet and never asking to stop.
    ///
    /// # Errors
    ///
    /// See [`start_stream`](Self::start_stream).
    pub async fn start_stream_with<A>(&self, token: &Token, action: A) -> TwitterResult<()>
    where
        A: FnMut(Tweet) + Send,
    {
        self.start_stream(token, always_continue(action)).await
    }
}

fn filter_request(
    token: &Token,
    url: &str,
    parameters: &BTreeMap<String, String>,
) -> OAuthResult<Request> {
    token.build_signed_request(url, Method::POST, Some(parameters))
}

impl TweetStream for FilteredStream {
    fn engine(&self) -> &StreamEngine {
        &self.engine
    }
}
