//! OAuth 1.0a request signing.
//!
//! The signing pipeline:
//! ```text
//! params + oauth_* → [percent-encode] → [sort] → canonical string
//!   → METHOD & enc(url) & enc(canonical) → HMAC-SHA1 → base64 → oauth_signature
//! ```

pub mod encode;
pub mod header;
pub mod signer;

pub use encode::{percent_decode, percent_encode, HexCase};
pub use header::{
    EchoHeaders, DEFAULT_ECHO_PROVIDER, DEFAULT_ECHO_REALM, SERVICE_PROVIDER_HEADER,
    VERIFY_CREDENTIALS_HEADER,
};
pub use signer::{HttpMethod, OAuthSigner, SignatureMethod, SignedRequest, SigningContext};

/// Protocol version sent in `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

pub(crate) const CONSUMER_KEY: &str = "oauth_consumer_key";
pub(crate) const NONCE: &str = "oauth_nonce";
pub(crate) const SIGNATURE: &str = "oauth_signature";
pub(crate) const SIGNATURE_METHOD: &str = "oauth_signature_method";
pub(crate) const TIMESTAMP: &str = "oauth_timestamp";
pub(crate) const TOKEN: &str = "oauth_token";
pub(crate) const VERIFIER: &str = "oauth_verifier";
pub(crate) const VERSION: &str = "oauth_version";
