//! Stream opener backed by `reqwest`.
//!
//! GET requests carry the signed parameters in the query string; POST
//! requests carry them as an `application/x-www-form-urlencoded` body.
//! Streaming responses never end on their own, so only the connect phase
//! is bounded by a timeout.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use chirpstream_core::error::TransportError;
use chirpstream_core::oauth::{HttpMethod, SignedRequest};
use chirpstream_core::transport::{ByteStream, StreamOpener};

/// Longest error body kept in [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Configuration for [`HttpStreamOpener`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Bound on establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            user_agent: Some(concat!("chirpstream/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

/// Opens long-lived streaming responses for signed requests.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpStreamOpener {
    http: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpStreamOpener {
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(HttpClientConfig::default())
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Send `request` and return the response once its status is known to
    /// be a success.
    pub async fn send(&self, request: &SignedRequest) -> Result<reqwest::Response, TransportError> {
        let builder = match request.method() {
            HttpMethod::Get => self.http.get(request.url_with_query()),
            HttpMethod::Post => self
                .http
                .post(request.url())
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(request.form_body()),
        };
        let builder = match &self.config.user_agent {
            Some(agent) => builder.header(USER_AGENT, agent.as_str()),
            None => builder,
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            truncate_utf8(&mut body, MAX_ERROR_BODY);
            tracing::debug!(url = %request.url(), status = status.as_u16(), "request rejected");
            return Err(status_error(status.as_u16(), body));
        }
        Ok(resp)
    }

    fn request_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.config.connect_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl StreamOpener for HttpStreamOpener {
    async fn open(&self, request: &SignedRequest) -> Result<ByteStream, TransportError> {
        let resp = self.send(request).await?;
        tracing::debug!(url = %request.url(), method = %request.method(), "stream opened");
        let bytes = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Io(e.to_string())));
        Ok(Box::pin(bytes))
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

/// Map a non-success status: 420 and 429 are throttling, everything else
/// is a plain status error.
pub fn status_error(status: u16, body: String) -> TransportError {
    match status {
        420 | 429 => TransportError::RateLimited { status },
        _ => TransportError::Status { status, body },
    }
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_statuses() {
        assert_eq!(status_error(420, "calm".into()), TransportError::RateLimited { status: 420 });
        assert_eq!(status_error(429, String::new()), TransportError::RateLimited { status: 429 });
        assert_eq!(
            status_error(401, "Unauthorized".into()),
            TransportError::Status { status: 401, body: "Unauthorized".into() }
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut s = "ééé".to_string();
        truncate_utf8(&mut s, 3);
        assert_eq!(s, "é");
        let mut short = "ok".to_string();
        truncate_utf8(&mut short, 10);
        assert_eq!(short, "ok");
    }

    #[test]
    fn default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.user_agent.unwrap().starts_with("chirpstream/"));
    }
}
