//! Birdwire OAuth - OAuth 1.0a request signing
//!
//! This crate provides the two pieces every outbound request goes through:
//!
//! - **Signature engine**: pure HMAC-SHA1 signing and `Authorization` header
//!   construction over a set of flagged protocol parameters
//! - **Request factory**: [`Token`], which owns a credential set and turns a
//!   URL, a method and optional extra parameters into a signed
//!   [`reqwest::Request`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use birdwire_oauth::{Credentials, Token};
//! use reqwest::Method;
//!
//! let token = Token::new(Credentials::new("ck", "cs", "at", "ats"))?;
//! let request = token.build_signed_request(
//!     "https://stream.twitter.com/1.1/statuses/sample.json",
//!     Method::GET,
//!     None,
//! )?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod oauth1;
mod token;

pub use error::*;
pub use oauth1::*;
pub use token::*;

/// Value of `oauth_signature_method`.
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Value of `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";
