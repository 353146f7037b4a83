//! Consumer and user key material.

use serde::{Deserialize, Serialize};

use crate::error::SignError;

/// OAuth credentials: the application's consumer pair plus an optional
/// user token pair.
///
/// The consumer key/secret are fixed per application. The token/secret are
/// issued per authorized user and are absent only while running the
/// request-token exchange. Empty strings count as absent.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
}

impl Credentials {
    /// Application-only credentials (no user token yet).
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
            token_secret: None,
        }
    }

    /// Attach a user token pair.
    pub fn with_token(mut self, token: impl Into<String>, token_secret: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.token_secret = Some(token_secret.into());
        self
    }

    /// The user token, if one has been issued and is non-empty.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// The user token secret, if non-empty.
    pub fn token_secret(&self) -> Option<&str> {
        self.token_secret.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns `true` once the user has completed authorization.
    pub fn is_authorized(&self) -> bool {
        self.token().is_some()
    }

    /// Fails unless the consumer key is present.
    pub fn require_consumer_key(&self) -> Result<&str, SignError> {
        if self.consumer_key.is_empty() {
            Err(SignError::MissingConsumerKey)
        } else {
            Ok(&self.consumer_key)
        }
    }

    /// Fails unless a user token is present.
    pub fn require_token(&self) -> Result<&str, SignError> {
        self.token().ok_or(SignError::MissingToken)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &self.token())
            .field("token_secret", &self.token_secret().map(|_| "<redacted>"))
            .finish()
    }
}
