//! Error types shared by every Chirpstream crate.

use thiserror::Error;

/// Errors raised while signing a request.
///
/// Signing never performs I/O, so every variant is a synchronous
/// configuration problem and is never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    /// Every signed request needs the application's consumer key.
    #[error("consumer key is missing")]
    MissingConsumerKey,

    /// The operation needs an authorized user token (streaming, OAuth Echo).
    #[error("user token is missing; complete the OAuth authorization first")]
    MissingToken,

    /// The signature method is recognised but not implemented.
    #[error("unsupported signature method: {0}")]
    UnsupportedSignatureMethod(String),

    /// The signing key was rejected by the MAC implementation.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// The target URL could not be parsed or is not http(s).
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Errors that can occur while opening or reading a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, TLS, DNS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The server throttled the connection attempt (420 / 429).
    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    /// Reading from an established stream failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Connecting timed out.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and a caller may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Io(_) | Self::Timeout { .. } | Self::RateLimited { .. }
        ) || matches!(self, Self::Status { status, .. } if *status >= 500)
    }
}

/// Errors from projecting an attribute tree into a typed model.
///
/// These never escape classification; they only explain why a tree
/// ended up as `Unclassified`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected an object")]
    NotAnObject,

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for field {field}")]
    InvalidField { field: &'static str },
}

/// Errors from percent-decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PercentDecodeError {
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}
