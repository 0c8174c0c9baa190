//! Transport seams the engine is written against.

use async_trait::async_trait;

use crate::{StreamResult, TransportError};

/// One live request/response pair.
///
/// Owned exclusively by a running engine. Replaced wholesale on reconnect and
/// aborted on every exit path.
#[async_trait]
pub trait StreamConnection: Send {
    /// Open, or reopen, a line reader over this connection.
    async fn open_reader(&mut self) -> StreamResult<Box<dyn LineReader>>;

    /// Abort the connection. Later reader opens must fail.
    fn abort(&mut self);
}

/// Sequential reader of newline-delimited payloads.
#[async_trait]
pub trait LineReader: Send {
    /// Read the next line without its terminator.
    ///
    /// `Ok(None)` means the transport produced no line: the body ended
    /// without an error. A keep-alive newline is `Ok(Some(""))`.
    async fn read_line(&mut self) -> Result<Option<String>, TransportError>;
}
