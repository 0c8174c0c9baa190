//! Streaming error types.

use std::fmt;

/// Streaming errors.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// A stream is already active on this engine.
    #[error("A stream is already running on this engine")]
    AlreadyRunning,

    /// No line dispatcher was supplied.
    #[error("No line handler was supplied")]
    NoHandler,

    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request factory could not build a request.
    #[error("Request factory failed: {0}")]
    RequestFactory(String),

    /// HTTP error.
    #[error("HTTP error: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Transport failure while reading.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// HTTP client error.
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// How a read from the transport failed.
///
/// Assigned by the transport at the point of failure; recovery decisions are
/// made on this, never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The peer closed the connection mid-stream.
    ConnectionClosed,
    /// The reader was closed locally, by a stop request.
    Disposed,
    /// Anything else.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::Disposed => write!(f, "reader disposed"),
            Self::Other => write!(f, "transport failure"),
        }
    }
}

/// A classified read failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Failure class.
    pub kind: TransportErrorKind,
    /// Human-readable detail, for logs only.
    pub message: String,
}

impl TransportError {
    /// Create a transport error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The peer closed the connection.
    #[must_use]
    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionClosed, message)
    }

    /// The reader was closed by a stop request.
    #[must_use]
    pub fn disposed() -> Self {
        Self::new(TransportErrorKind::Disposed, "reader closed by stop request")
    }

    /// Unclassified failure.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// Classify a body read error reported by `reqwest`.
    #[must_use]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if is_connection_closed(error) {
            Self::connection_closed(error.to_string())
        } else {
            Self::other(error.to_string())
        }
    }
}

/// Walk the source chain looking for an I/O error that means the peer went
/// away. A body error without one still means the body stream was cut.
fn is_connection_closed(error: &reqwest::Error) -> bool {
    use std::error::Error as _;
    use std::io::ErrorKind;

    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            );
        }
        source = cause.source();
    }

    error.is_body()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::connection_closed("reset by peer");
        assert_eq!(err.to_string(), "connection closed: reset by peer");
        assert_eq!(err.kind, TransportErrorKind::ConnectionClosed);
    }

    #[test]
    fn test_disposed_kind() {
        assert_eq!(TransportError::disposed().kind, TransportErrorKind::Disposed);
    }
}
