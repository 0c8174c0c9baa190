//! HTTP transport over `reqwest`.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, StreamExt};
use reqwest::{Client, Request};
use tracing::debug;

use crate::{
    DEFAULT_BUFFER_SIZE, LineReader, StreamConnection, StreamError, StreamResult, TransportError,
};

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

type RequestSource = Box<dyn FnMut() -> StreamResult<Request> + Send>;

/// A streaming endpoint plus the client that reads from it.
///
/// Every [`open_reader`](StreamConnection::open_reader) asks `build` for a
/// new request, so a reopen carries a fresh signature rather than replaying
/// a nonce the server has already seen.
pub struct HttpConnection {
    client: Client,
    build: RequestSource,
    aborted: bool,
}

impl HttpConnection {
    /// Create a connection that builds its request with `build`. Any timeout
    /// on the built request is cleared: the feed is expected to stay open
    /// indefinitely.
    pub fn new<B>(client: Client, build: B) -> Self
    where
        B: FnMut() -> StreamResult<Request> + Send + 'static,
    {
        Self {
            client,
            build: Box::new(build),
            aborted: false,
        }
    }
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StreamConnection for HttpConnection {
    async fn open_reader(&mut self) -> StreamResult<Box<dyn LineReader>> {
        if self.aborted {
            return Err(StreamError::InvalidState("connection was aborted".into()));
        }

        let mut request = (self.build)()?;
        *request.timeout_mut() = None;

        debug!(method = %request.method(), url = %request.url(), "Opening stream reader");
        let response = self.client.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StreamError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(Box::new(HttpLineReader::new(response.bytes_stream())))
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// Splits a byte stream into lines. Handles `\n` and `\r\n` terminators and
/// lines split across chunks.
pub struct HttpLineReader {
    stream: ByteStream,
    buffer: BytesMut,
    finished: bool,
}

impl HttpLineReader {
    /// Create a reader over any byte stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            finished: false,
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line = self.buffer.split_to(newline + 1);
        line.truncate(newline);
        if line.last() == Some(&b'\r') {
            line.truncate(newline - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[async_trait]
impl LineReader for HttpLineReader {
    async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            if self.finished {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = self.buffer.split();
                return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(TransportError::from_reqwest(&e)),
                None => self.finished = true,
            }
        }
    }
}
