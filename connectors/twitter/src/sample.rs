//! The plain sample feed.

use birdwire_oauth::Token;
use birdwire_streaming::{Flow, StreamEngine};
use reqwest::Method;
use tracing::{info, instrument};

use crate::{
    config::TwitterConfig,
    error::TwitterResult,
    stream::{Deletions, TweetStream, always_continue, decoder, signed_connection},
    types::Tweet,
};

/// A random sample of all public statuses, fetched with a signed `GET`.
///
/// Deletion notices never reach the processor.
#[derive(Debug)]
pub struct SimpleStream {
    engine: StreamEngine,
    url: String,
}

impl SimpleStream {
    /// Create a stream reading from `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            engine: StreamEngine::new(),
            url: url.into(),
        }
    }

    /// Create a stream reading from the configured sample endpoint.
    #[must_use]
    pub fn from_config(config: &TwitterConfig) -> Self {
        Self::new(config.sample_url())
    }

    /// The endpoint this stream reads from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

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
        info!("Starting sample stream");
        self.engine
            .start_stream(Some(decoder(processor, Deletions::Skip)), || {
                let url = self.url.clone();
                Ok(signed_connection(token, move |signer| {
                    signer.build_signed_request(&url, Method::GET, None)
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

impl TweetStream for SimpleStream {
    fn engine(&self) -> &StreamEngine {
        &self.engine
    }
}
