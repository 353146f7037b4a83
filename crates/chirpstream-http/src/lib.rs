//! chirpstream-http: the HTTP side of Chirpstream.
//!
//! - [`HttpStreamOpener`] implements [`chirpstream_core::StreamOpener`] over
//!   `reqwest`, handing back the response body as a raw byte stream
//! - [`echo`] attaches OAuth Echo headers to an outgoing third-party request
//! - [`AuthorizationFlow`] runs the request-token / access-token exchange

pub mod client;
pub mod echo;
pub mod oauth_flow;

pub use client::{HttpClientConfig, HttpStreamOpener};
pub use echo::with_echo_headers;
pub use oauth_flow::{AccessToken, AuthorizationFlow, FlowError, OAuthEndpoints, RequestToken};
