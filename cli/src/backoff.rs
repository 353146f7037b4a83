//! Exponential reconnect backoff.

use std::time::Duration;

use chirpstream_core::TransportError;
use chirpstream_stream::RegistryError;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Give up after this many consecutive failed attempts.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Starting delay when the server throttled the connect.
    pub rate_limited_backoff: Duration,
    /// Caps exponential growth.
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            initial_backoff: Duration::from_millis(250),
            rate_limited_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(320),
            multiplier: 2.0,
        }
    }
}

/// Stateless policy: computes the delay before the `attempt`-th retry.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub config: BackoffConfig,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Delay before retry `attempt` (1-based) after `error`, or `None`
    /// once retries are exhausted.
    pub fn next_delay(&self, attempt: u32, error: &RegistryError) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base = match error {
            RegistryError::Transport(TransportError::RateLimited { .. }) => {
                self.config.rate_limited_backoff
            }
            _ => self.config.initial_backoff,
        };
        let ms = base.as_millis() as f64 * self.config.multiplier.powi((attempt - 1) as i32);
        let capped = ms.min(self.config.max_backoff.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}
