//! Birdwire Test Kit - shared test infrastructure
//!
//! - [`MockStreamServer`] - wiremock-backed server for newline-delimited
//!   streaming endpoints and REST error responses
//! - Tracing configuration for test output
//!
//! # Example
//!
//! ```rust,ignore
//! use birdwire_testkit::{MockStreamServer, init_test_tracing};
//!
//! #[tokio::test]
//! async fn test_sample_stream() {
//!     init_test_tracing();
//!
//!     let mock = MockStreamServer::start().await;
//!     mock.stream_lines("GET", "/1.1/statuses/sample.json", &[r#"{"id":1,"text":"hi"}"#])
//!         .await;
//!
//!     // point the stream at mock.url("/1.1/statuses/sample.json") ...
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod mock_server;
mod tracing_config;

pub use mock_server::*;
pub use tracing_config::*;
