//! chirpstream-core: foundation types for Chirpstream.
//!
//! # Overview
//!
//! Chirpstream is a client for a microblogging platform's real-time push API.
//! The core crate holds everything that does not touch a socket:
//!
//! - [`Credentials`]: consumer and user key material
//! - [`oauth`] module: OAuth 1.0a percent-encoding, HMAC-SHA1 signing,
//!   `Authorization` headers and OAuth Echo
//! - [`tree`] module: the generic attribute tree every wire line decodes into
//! - [`model`] module: users, posts and lists projected from attribute trees
//! - [`classify`] module: the streaming event classifier
//! - [`StreamOpener`]: the async seam a transport implements to hand back a
//!   raw byte stream for a signed request
//! - [`error`] module: structured error types

pub mod classify;
pub mod credentials;
pub mod error;
pub mod model;
pub mod oauth;
pub mod transport;
pub mod tree;

pub use classify::{classify, classify_line, ClassifiedEvent};
pub use credentials::Credentials;
pub use error::{DecodeError, PercentDecodeError, SignError, TransportError};
pub use model::{Post, User, UserList};
pub use oauth::{HexCase, HttpMethod, OAuthSigner, SignatureMethod, SignedRequest, SigningContext};
pub use transport::{ByteStream, StreamOpener};
pub use tree::{decode_line, AttributeTree, TreeExt};
