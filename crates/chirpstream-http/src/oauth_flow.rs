//! The three-legged OAuth exchange that turns an application's consumer
//! pair into per-user token credentials.
//!
//! ```text
//! request_token() ──► authorize_url() ──(user approves, gets PIN)──► access_token()
//! ```
//!
//! Applications granted xAuth can skip the browser step and trade a
//! username and password directly with [`AuthorizationFlow::xauth_access_token`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use url::form_urlencoded;

use chirpstream_core::error::{SignError, TransportError};
use chirpstream_core::oauth::{percent_encode, HexCase, HttpMethod, OAuthSigner, SigningContext};
use chirpstream_core::Credentials;

use crate::client::HttpStreamOpener;

/// Errors from the token exchange.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider's reply lacked a required field.
    #[error("token response is missing {field}")]
    MissingField { field: &'static str },
}

/// Token-exchange endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthEndpoints {
    pub request_token: String,
    pub authorize: String,
    pub access_token: String,
    /// Where xAuth username/password exchanges are posted.
    pub xauth_access_token: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            request_token: "http://twitter.com/oauth/request_token".into(),
            authorize: "http://twitter.com/oauth/authorize".into(),
            access_token: "http://twitter.com/oauth/access_token".into(),
            xauth_access_token: "https://api.twitter.com/oauth/access_token".into(),
        }
    }
}

/// Unauthorized request token returned by the first leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
    pub callback_confirmed: bool,
}

/// Per-user token credentials returned by the last leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
    pub screen_name: Option<String>,
    pub user_id: Option<i64>,
}

impl AccessToken {
    /// Combine with the application's consumer pair into full credentials.
    pub fn credentials(&self, consumer: &Credentials) -> Credentials {
        Credentials::new(&consumer.consumer_key, &consumer.consumer_secret)
            .with_token(&self.token, &self.secret)
    }
}

/// Runs the request-token / authorize / access-token exchange.
#[derive(Debug, Clone)]
pub struct AuthorizationFlow {
    http: HttpStreamOpener,
    signer: OAuthSigner,
    endpoints: OAuthEndpoints,
}

impl AuthorizationFlow {
    pub fn new(http: HttpStreamOpener, signer: OAuthSigner, endpoints: OAuthEndpoints) -> Self {
        Self { http, signer, endpoints }
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    /// First leg: obtain an unauthorized request token. Any user token in
    /// `consumer` is ignored.
    pub async fn request_token(&self, consumer: &Credentials) -> Result<RequestToken, FlowError> {
        let app_only = Credentials::new(&consumer.consumer_key, &consumer.consumer_secret);
        let signed = self.signer.sign(
            &app_only,
            HttpMethod::Post,
            &self.endpoints.request_token,
            &[],
        )?;
        let fields = self.exchange(&signed).await?;
        let token = RequestToken {
            token: required(&fields, "oauth_token")?,
            secret: required(&fields, "oauth_token_secret")?,
            callback_confirmed: field(&fields, "oauth_callback_confirmed") == Some("true"),
        };
        tracing::info!(endpoint = %self.endpoints.request_token, "request token issued");
        Ok(token)
    }

    /// Second leg: the page the user visits to approve the application.
    pub fn authorize_url(&self, token: &RequestToken) -> String {
        format!(
            "{}?oauth_token={}",
            self.endpoints.authorize,
            percent_encode(&token.token, HexCase::Upper)
        )
    }

    /// Last leg: trade the approved request token and the verifier (PIN)
    /// for access credentials.
    pub async fn access_token(
        &self,
        consumer: &Credentials,
        request_token: &RequestToken,
        verifier: &str,
    ) -> Result<AccessToken, FlowError> {
        let creds = Credentials::new(&consumer.consumer_key, &consumer.consumer_secret)
            .with_token(&request_token.token, &request_token.secret);
        let context = SigningContext::fresh().with_verifier(verifier);
        let signed = self.signer.sign_with(
            &creds,
            HttpMethod::Get,
            &self.endpoints.access_token,
            &[],
            &context,
        )?;
        let fields = self.exchange(&signed).await?;
        let access = access_token_from(&fields)?;
        tracing::info!(screen_name = ?access.screen_name, "access token issued");
        Ok(access)
    }

    /// Trade a username and password for access credentials in one
    /// signed POST (`x_auth_mode=client_auth`). Only applications the
    /// provider has enabled for xAuth get an answer other than 401.
    pub async fn xauth_access_token(
        &self,
        consumer: &Credentials,
        username: &str,
        password: &str,
    ) -> Result<AccessToken, FlowError> {
        let app_only = Credentials::new(&consumer.consumer_key, &consumer.consumer_secret);
        let params = [
            ("x_auth_username".to_string(), username.to_string()),
            ("x_auth_password".to_string(), password.to_string()),
            ("x_auth_mode".to_string(), "client_auth".to_string()),
        ];
        let signed = self.signer.sign(
            &app_only,
            HttpMethod::Post,
            &self.endpoints.xauth_access_token,
            &params,
        )?;
        let fields = self.exchange(&signed).await?;
        let access = access_token_from(&fields)?;
        tracing::info!(screen_name = ?access.screen_name, "xAuth access token issued");
        Ok(access)
    }

    async fn exchange(
        &self,
        signed: &chirpstream_core::SignedRequest,
    ) -> Result<Vec<(String, String)>, FlowError> {
        let body = self
            .http
            .send(signed)
            .await?
            .text()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(parse_form(&body))
    }
}

/// Decode an `application/x-www-form-urlencoded` body. `+` is a space;
/// invalid UTF-8 is replaced.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(body.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn access_token_from(fields: &[(String, String)]) -> Result<AccessToken, FlowError> {
    Ok(AccessToken {
        token: required(fields, "oauth_token")?,
        secret: required(fields, "oauth_token_secret")?,
        screen_name: field(fields, "screen_name").map(str::to_owned),
        user_id: field(fields, "user_id").and_then(|id| id.parse().ok()),
    })
}

fn field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn required(fields: &[(String, String)], key: &'static str) -> Result<String, FlowError> {
    field(fields, key)
        .map(str::to_owned)
        .ok_or(FlowError::MissingField { field: key })
}
