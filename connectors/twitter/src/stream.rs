//! Pieces shared by the stream variants: lifecycle controls, the per-line
//! decoder and the signed HTTP connection factory.

use birdwire_oauth::{OAuthResult, Token};
use birdwire_streaming::{
    Flow, HttpConnection, StreamEngine, StreamError, StreamState,
};
use reqwest::Request;
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{DeletionNotice, Tweet};

/// Lifecycle controls common to every stream variant.
///
/// All of these may be called from another task while `start_stream` runs.
pub trait TweetStream {
    /// The engine driving this stream.
    fn engine(&self) -> &StreamEngine;

    /// Current lifecycle state.
    fn state(&self) -> StreamState {
        self.engine().state()
    }

    /// Hold the read loop before its next read.
    fn pause_stream(&self) {
        self.engine().pause_stream();
    }

    /// Release a paused read loop.
    fn resume_stream(&self) {
        self.engine().resume_stream();
    }

    /// End the stream, interrupting a pending read.
    fn stop_stream(&self) {
        self.engine().stop_stream();
    }
}

/// Wrap an "act on every tweet" callback so it never asks to stop.
pub fn always_continue<A>(mut action: A) -> impl FnMut(Tweet) -> Flow + Send
where
    A: FnMut(Tweet) + Send,
{
    move |tweet| {
        action(tweet);
        Flow::Continue
    }
}

/// What the decoder does with deletion notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deletions {
    /// Drop notices before they reach the processor.
    Skip,
    /// Treat notices like any other record.
    Decode,
}

/// Turn a tweet processor into the engine's line dispatcher.
pub(crate) fn decoder<P>(mut processor: P, deletions: Deletions) -> impl FnMut(Option<&str>) -> Flow + Send
where
    P: FnMut(Tweet) -> Flow + Send,
{
    move |line: Option<&str>| decode_line(line, deletions, &mut processor)
}

pub(crate) fn decode_line<P>(line: Option<&str>, deletions: Deletions, processor: &mut P) -> Flow
where
    P: FnMut(Tweet) -> Flow,
{
    let Some(line) = line else {
        warn!("Stream transport failed");
        return Flow::Stop;
    };

    let record = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(record)) => record,
        Ok(_) => {
            debug!("Discarding non-object record");
            return Flow::Continue;
        }
        Err(e) => {
            warn!(error = %e, "Discarding undecodable line");
            return Flow::Continue;
        }
    };

    if deletions == Deletions::Skip && DeletionNotice::is_notice(&record) {
        if let Some(notice) = DeletionNotice::from_record(&record) {
            debug!(status_id = notice.status.id, "Skipping deletion notice");
        }
        return Flow::Continue;
    }

    match Tweet::from_record(record) {
        Some(tweet) => processor(tweet),
        None => {
            debug!("Discarding record that is not a tweet");
            Flow::Continue
        }
    }
}

/// A stream connection on `token`'s client that signs a new request with
/// `build` every time a reader is opened.
pub(crate) fn signed_connection<B>(token: &Token, mut build: B) -> HttpConnection
where
    B: FnMut(&Token) -> OAuthResult<Request> + Send + 'static,
{
    let signer = token.clone();
    HttpConnection::new(token.client().clone(), move || {
        build(&signer).map_err(|e| StreamError::RequestFactory(e.to_string()))
    })
}
