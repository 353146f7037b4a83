//! Registry configuration.

use serde::{Deserialize, Serialize};

use chirpstream_core::oauth::{HexCase, OAuthSigner, SignatureMethod};

/// Where the streaming endpoints live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEndpoints {
    /// Base of the public streams; `<base>/<kind>.json` is appended.
    #[serde(default = "default_public_base")]
    pub public_base: String,
    /// Full URL of the per-user stream.
    #[serde(default = "default_user_stream")]
    pub user_stream: String,
}

fn default_public_base() -> String { "http://stream.twitter.com/1/statuses".into() }
fn default_user_stream() -> String { "https://userstream.twitter.com/2/user.json".into() }

impl Default for StreamEndpoints {
    fn default() -> Self {
        Self {
            public_base: default_public_base(),
            user_stream: default_user_stream(),
        }
    }
}

/// Configuration for a [`StreamRegistry`](crate::StreamRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub endpoints: StreamEndpoints,
    /// A connection whose pending line grows past this faults.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default)]
    pub signature_method: SignatureMethod,
    #[serde(default)]
    pub hex_case: HexCase,
}

fn default_max_line_bytes() -> usize { 1024 * 1024 }

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoints: StreamEndpoints::default(),
            max_line_bytes: default_max_line_bytes(),
            signature_method: SignatureMethod::default(),
            hex_case: HexCase::default(),
        }
    }
}

impl RegistryConfig {
    /// Point both public and user streams at one host, e.g. a local test server.
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            endpoints: StreamEndpoints {
                public_base: format!("{base}/1/statuses"),
                user_stream: format!("{base}/2/user.json"),
            },
            ..Self::default()
        }
    }

    pub fn signer(&self) -> OAuthSigner {
        OAuthSigner::new(self.signature_method, self.hex_case)
    }
}
