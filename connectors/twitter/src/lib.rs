//! Birdwire Twitter Connector
//!
//! Consumers for the v1.1 streaming feeds, signed with OAuth 1.0a.
//!
//! - [`SimpleStream`] - the plain sample feed (`GET`), deletion notices
//!   suppressed
//! - [`FilteredStream`] - the keyword-filtered feed (`POST track=...`)
//!
//! Both delegate to [`birdwire_streaming::StreamEngine`], which owns the
//! connection lifecycle and the reconnect-on-silence policy.
//!
//! ```rust,ignore
//! use birdwire_twitter::{Flow, SimpleStream, TwitterConfig};
//!
//! let config = TwitterConfig::from_env()?;
//! let token = config.token()?;
//! let stream = SimpleStream::from_config(&config);
//!
//! let mut seen = 0;
//! stream
//!     .start_stream(&token, |tweet| {
//!         println!("{}", tweet.text);
//!         seen += 1;
//!         Flow::from_continue(seen < 10)
//!     })
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod filter;
mod sample;
mod stream;
mod types;

pub use birdwire_streaming::{Flow, StreamState};
pub use config::{FILTER_PATH, SAMPLE_PATH, TwitterConfig};
pub use error::{TwitterError, TwitterResult};
pub use filter::FilteredStream;
pub use sample::SimpleStream;
pub use stream::{TweetStream, always_continue};
pub use types::{CREATED_AT_FORMAT, DELETION_MARKER, DeletedStatus, DeletionNotice, Tweet, User};
