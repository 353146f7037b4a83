//! `Authorization: OAuth ...` headers and OAuth Echo delegation.

use super::encode::percent_encode;
use super::signer::{HttpMethod, OAuthSigner, SignedRequest, SigningContext};
use super::{CONSUMER_KEY, NONCE, SIGNATURE, SIGNATURE_METHOD, TIMESTAMP, TOKEN, VERSION};
use crate::credentials::Credentials;
use crate::error::SignError;

/// Identity provider endpoint a third party calls to verify an Echo header.
pub const DEFAULT_ECHO_PROVIDER: &str = "https://api.twitter.com/1/account/verify_credentials.json";

/// Realm used in Echo headers.
pub const DEFAULT_ECHO_REALM: &str = "http://api.twitter.com/";

/// Header name carrying the identity provider URL.
pub const SERVICE_PROVIDER_HEADER: &str = "X-Auth-Service-Provider";

/// Header name carrying the delegated authorization.
pub const VERIFY_CREDENTIALS_HEADER: &str = "X-Verify-Credentials-Authorization";

/// Header order is fixed; `oauth_token` is skipped when no token was issued.
const HEADER_ORDER: [&str; 7] = [
    VERSION,
    NONCE,
    TIMESTAMP,
    SIGNATURE_METHOD,
    CONSUMER_KEY,
    SIGNATURE,
    TOKEN,
];

impl SignedRequest {
    /// Render the oauth_* parameters as an `Authorization` header value.
    pub fn authorization_header(&self, realm: Option<&str>) -> String {
        let case = self.hex_case();
        let mut parts = Vec::with_capacity(HEADER_ORDER.len() + 1);
        if let Some(realm) = realm {
            parts.push(format!("realm=\"{realm}\""));
        }
        for key in HEADER_ORDER {
            if let Some(value) = self.param(key) {
                parts.push(format!("{key}=\"{}\"", percent_encode(value, case)));
            }
        }
        format!("OAuth {}", parts.join(", "))
    }
}

/// Headers handed to a third-party endpoint so it can verify the user
/// with the platform on the client's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoHeaders {
    /// Value for `X-Auth-Service-Provider`.
    pub service_provider: String,
    /// Value for `X-Verify-Credentials-Authorization`.
    pub authorization: String,
}

impl EchoHeaders {
    /// `(name, value)` pairs ready to attach to a request.
    pub fn pairs(&self) -> [(&'static str, &str); 2] {
        [
            (SERVICE_PROVIDER_HEADER, self.service_provider.as_str()),
            (VERIFY_CREDENTIALS_HEADER, self.authorization.as_str()),
        ]
    }
}

impl OAuthSigner {
    /// Build Echo headers for `provider` with a fresh nonce and timestamp.
    pub fn echo_headers(
        &self,
        credentials: &Credentials,
        provider: &str,
        params: &[(String, String)],
    ) -> Result<EchoHeaders, SignError> {
        self.echo_headers_with(credentials, provider, params, &SigningContext::fresh())
    }

    /// Build Echo headers with an explicit signing context.
    pub fn echo_headers_with(
        &self,
        credentials: &Credentials,
        provider: &str,
        params: &[(String, String)],
        context: &SigningContext,
    ) -> Result<EchoHeaders, SignError> {
        credentials.require_token()?;
        let signed = self.sign_with(credentials, HttpMethod::Get, provider, params, context)?;
        Ok(EchoHeaders {
            service_provider: provider.to_string(),
            authorization: signed.authorization_header(Some(DEFAULT_ECHO_REALM)),
        })
    }
}
