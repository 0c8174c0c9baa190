//! Birdwire Streaming - line-delimited stream ingestion
//!
//! This crate owns the lifecycle of one long-lived streaming connection:
//!
//! - **Engine**: [`StreamEngine`] opens a connection through a caller-supplied
//!   factory, reads newline-delimited payloads and hands each one to a
//!   caller-supplied dispatcher
//! - **State machine**: [`StreamState`] with thread-safe pause/resume/stop
//! - **Recovery**: escalating reconnect on silence, one reader reopen on a
//!   peer-closed connection
//! - **Transport**: [`StreamConnection`]/[`LineReader`] traits with an HTTP
//!   implementation over `reqwest`
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use birdwire_streaming::{Flow, HttpConnection, StreamEngine};
//!
//! let engine = StreamEngine::new();
//! engine
//!     .start_stream(
//!         Some(|line: Option<&str>| match line {
//!             Some(line) => {
//!                 println!("{line}");
//!                 Flow::Continue
//!             }
//!             None => Flow::Stop,
//!         }),
//!         || Ok(HttpConnection::new(client.clone(), build_request)),
//!     )
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod engine;
mod error;
mod http;
mod state;
mod transport;

pub use engine::*;
pub use error::*;
pub use http::*;
pub use state::*;
pub use transport::*;

/// Initial capacity of the HTTP line buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Outcome of dispatching one line: keep reading or end the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep the stream running.
    Continue,
    /// Stop the stream after this line.
    Stop,
}

impl Flow {
    /// Map a "keep going" boolean onto a flow.
    #[must_use]
    pub const fn from_continue(keep_going: bool) -> Self {
        if keep_going { Self::Continue } else { Self::Stop }
    }
}
