//! Command-line configuration: a JSON file plus environment overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use chirpstream_core::Credentials;
use chirpstream_http::{HttpClientConfig, OAuthEndpoints};
use chirpstream_stream::RegistryConfig;

use crate::logging::LogConfig;

pub const ENV_CONSUMER_KEY: &str = "CHIRPSTREAM_CONSUMER_KEY";
pub const ENV_CONSUMER_SECRET: &str = "CHIRPSTREAM_CONSUMER_SECRET";
pub const ENV_TOKEN: &str = "CHIRPSTREAM_TOKEN";
pub const ENV_TOKEN_SECRET: &str = "CHIRPSTREAM_TOKEN_SECRET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_connect_timeout_secs() -> u64 { 5 }

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

impl HttpSettings {
    pub fn client_config(&self) -> HttpClientConfig {
        let defaults = HttpClientConfig::default();
        HttpClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            user_agent: self.user_agent.clone().or(defaults.user_agent),
        }
    }
}

/// Everything the tool reads from `--config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub oauth: OAuthEndpoints,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// Read `path` if given, then apply `CHIRPSTREAM_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Non-empty variables override the file's credentials.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(key) = get(ENV_CONSUMER_KEY) {
            self.credentials.consumer_key = key;
        }
        if let Some(secret) = get(ENV_CONSUMER_SECRET) {
            self.credentials.consumer_secret = secret;
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.credentials.token = Some(token);
        }
        if let Some(secret) = get(ENV_TOKEN_SECRET) {
            self.credentials.token_secret = Some(secret);
        }
    }
}
