//! Error types for stream descriptions and the registry.

use thiserror::Error;

use chirpstream_core::error::{SignError, TransportError};

use crate::description::StreamKind;

/// A stream description that cannot be sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptionError {
    /// The parameter is not accepted by this kind of stream.
    #[error("parameter `{parameter}` is not allowed on the {kind} stream")]
    ForbiddenParameter {
        kind: StreamKind,
        parameter: &'static str,
    },

    #[error("the filter stream needs at least one follow id or track keyword")]
    MissingFilterPredicate,

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("invalid track keyword {keyword:?}: {reason}")]
    InvalidKeyword {
        keyword: String,
        reason: &'static str,
    },

    #[error("invalid `with` modifier {0:?}")]
    InvalidModifier(String),

    #[error("unknown stream kind {0:?}")]
    UnknownKind(String),
}

/// Errors returned by [`StreamRegistry`](crate::StreamRegistry) operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Description(#[from] DescriptionError),

    /// Signing failed, including a missing user token.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// The opener could not establish the stream.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `events()` hands out the merged stream only once.
    #[error("the event stream has already been taken")]
    EventsTaken,

    #[error("the registry has been shut down")]
    ShutDown,
}

impl RegistryError {
    /// Returns `true` if retrying the same connect may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_retryable())
    }
}
