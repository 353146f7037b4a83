//! The OAuth 1.0a signer.
//!
//! [`OAuthSigner`] is stateless apart from its configuration: given the same
//! credentials, request and [`SigningContext`] it always produces the same
//! [`SignedRequest`]. Fresh nonces and timestamps come from
//! [`SigningContext::fresh`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use url::Url;
use uuid::Uuid;

use super::encode::{percent_encode, HexCase};
use super::{
    CONSUMER_KEY, NONCE, OAUTH_VERSION, SIGNATURE, SIGNATURE_METHOD, TIMESTAMP, TOKEN, VERIFIER,
    VERSION,
};
use crate::credentials::Credentials;
use crate::error::SignError;

type HmacSha1 = Hmac<Sha1>;

/// HTTP verb of a signed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// Value of `oauth_signature_method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureMethod {
    #[default]
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
    /// Recognised on the wire but not implemented.
    #[serde(rename = "RSA-SHA1")]
    RsaSha1,
}

impl SignatureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::Plaintext => "PLAINTEXT",
            Self::RsaSha1 => "RSA-SHA1",
        }
    }
}

impl std::fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request values that make a signature unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub nonce: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// `oauth_verifier`, only during the access-token exchange.
    pub verifier: Option<String>,
}

impl SigningContext {
    /// A random nonce and the current time.
    pub fn fresh() -> Self {
        Self {
            nonce: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now().timestamp(),
            verifier: None,
        }
    }

    /// Fixed values, for reproducible signatures.
    pub fn fixed(nonce: impl Into<String>, timestamp: i64) -> Self {
        Self {
            nonce: nonce.into(),
            timestamp,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into()).filter(|v| !v.is_empty());
        self
    }
}

/// A request with its merged, signed parameter set.
///
/// Parameters are stored decoded and in canonical order; every rendering
/// (query string, form body, header) percent-encodes on the way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    method: HttpMethod,
    url: String,
    params: Vec<(String, String)>,
    base_string: String,
    signature: String,
    hex_case: HexCase,
}

impl SignedRequest {
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The normalized URL (no query string).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// All parameters, `oauth_signature` included, in canonical order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// First value of `key`, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The exact string the HMAC was computed over.
    pub fn base_string(&self) -> &str {
        &self.base_string
    }

    /// The base64 signature, not yet percent-encoded.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The signature as it appears on the wire.
    pub fn encoded_signature(&self) -> String {
        percent_encode(&self.signature, self.hex_case)
    }

    pub(crate) fn hex_case(&self) -> HexCase {
        self.hex_case
    }

    /// `k=v&k=v` with every key and value percent-encoded.
    pub fn query_string(&self) -> String {
        join_encoded(self.params.iter(), self.hex_case)
    }

    /// Same encoding as [`query_string`](Self::query_string), for
    /// `application/x-www-form-urlencoded` bodies.
    pub fn form_body(&self) -> String {
        self.query_string()
    }

    /// The URL with the signed parameters appended as a query string.
    pub fn url_with_query(&self) -> String {
        format!("{}?{}", self.url, self.query_string())
    }
}

fn join_encoded<'a>(
    params: impl Iterator<Item = &'a (String, String)>,
    case: HexCase,
) -> String {
    params
        .map(|(k, v)| format!("{}={}", percent_encode(k, case), percent_encode(v, case)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signs requests with OAuth 1.0a.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OAuthSigner {
    method: SignatureMethod,
    hex_case: HexCase,
}

impl OAuthSigner {
    pub fn new(method: SignatureMethod, hex_case: HexCase) -> Self {
        Self { method, hex_case }
    }

    /// HMAC-SHA1 with upper-case escapes.
    pub fn hmac_sha1() -> Self {
        Self::default()
    }

    pub fn with_hex_case(mut self, hex_case: HexCase) -> Self {
        self.hex_case = hex_case;
        self
    }

    pub fn signature_method(&self) -> SignatureMethod {
        self.method
    }

    pub fn hex_case(&self) -> HexCase {
        self.hex_case
    }

    /// Sign with a fresh nonce and the current timestamp.
    pub fn sign(
        &self,
        credentials: &Credentials,
        method: HttpMethod,
        url: &str,
        params: &[(String, String)],
    ) -> Result<SignedRequest, SignError> {
        self.sign_with(credentials, method, url, params, &SigningContext::fresh())
    }

    /// Sign with explicit nonce/timestamp/verifier.
    pub fn sign_with(
        &self,
        credentials: &Credentials,
        method: HttpMethod,
        url: &str,
        params: &[(String, String)],
        context: &SigningContext,
    ) -> Result<SignedRequest, SignError> {
        let consumer_key = credentials.require_consumer_key()?;

        let (normalized_url, query_params) = normalize_url(url)?;

        let mut merged: Vec<(String, String)> = query_params;
        merged.extend(params.iter().cloned());
        merged.push((VERSION.into(), OAUTH_VERSION.into()));
        merged.push((NONCE.into(), context.nonce.clone()));
        merged.push((TIMESTAMP.into(), context.timestamp.to_string()));
        merged.push((SIGNATURE_METHOD.into(), self.method.as_str().into()));
        merged.push((CONSUMER_KEY.into(), consumer_key.into()));
        if let Some(verifier) = context.verifier.as_deref().filter(|v| !v.is_empty()) {
            merged.push((VERIFIER.into(), verifier.into()));
        }
        if let Some(token) = credentials.token() {
            merged.push((TOKEN.into(), token.into()));
        }

        self.sort_canonical(&mut merged);
        let canonical = join_encoded(merged.iter(), self.hex_case);

        let base_string = format!(
            "{}&{}&{}",
            method.as_str(),
            percent_encode(&normalized_url, self.hex_case),
            percent_encode(&canonical, self.hex_case),
        );

        let key = format!(
            "{}&{}",
            percent_encode(&credentials.consumer_secret, self.hex_case),
            percent_encode(credentials.token_secret().unwrap_or(""), self.hex_case),
        );

        let signature = match self.method {
            SignatureMethod::HmacSha1 => hmac_sha1_base64(&key, &base_string)?,
            SignatureMethod::Plaintext => key,
            SignatureMethod::RsaSha1 => {
                return Err(SignError::UnsupportedSignatureMethod(self.method.to_string()))
            }
        };

        tracing::trace!(url = %normalized_url, %method, base = %base_string, "signed request");

        merged.push((SIGNATURE.into(), signature.clone()));
        self.sort_canonical(&mut merged);

        Ok(SignedRequest {
            method,
            url: normalized_url,
            params: merged,
            base_string,
            signature,
            hex_case: self.hex_case,
        })
    }

    /// The canonical parameter string for `params` (no oauth_* added).
    pub fn canonical_parameters(&self, params: &[(String, String)]) -> String {
        let mut sorted = params.to_vec();
        self.sort_canonical(&mut sorted);
        join_encoded(sorted.iter(), self.hex_case)
    }

    fn sort_canonical(&self, params: &mut [(String, String)]) {
        let case = self.hex_case;
        params.sort_by_cached_key(|(k, v)| (percent_encode(k, case), percent_encode(v, case)));
    }
}

fn hmac_sha1_base64(key: &str, message: &str) -> Result<String, SignError> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Split `url` into its normalized form and any query pairs it carried.
fn normalize_url(url: &str) -> Result<(String, Vec<(String, String)>), SignError> {
    let parsed = Url::parse(url).map_err(|e| SignError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(SignError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {scheme}"),
        });
    }
    let host = parsed.host_str().ok_or_else(|| SignError::InvalidUrl {
        url: url.to_string(),
        reason: "missing host".into(),
    })?;

    // `Url` already drops default ports and lower-cases scheme and host.
    let mut normalized = format!("{scheme}://{host}");
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(parsed.path());

    let query = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Ok((normalized, query))
}
