//! Construction-time configuration.
//!
//! Nothing in the client reads the environment by itself. Callers that want
//! the `REST_DEBUG` / `SSE_DEBUG` switches call [`DebugFlags::from_env`] where
//! they build the client.

use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(3);
pub const DEFAULT_RETRY_MAX_WAIT: Duration = Duration::from_secs(10);

/// Returns true when `key` is set to "1", "true" or "yes" (any case).
pub fn env_is_truthy(key: &str) -> bool {
    std::env::var(key).map(|v| is_truthy(&v)).unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Verbose tracing switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
    /// Log request and response bodies at `debug` level.
    pub rest: bool,
    /// Realtime stream tracing; carried for callers, unused by the REST client.
    pub sse: bool,
}

impl DebugFlags {
    pub fn from_env() -> Self {
        Self {
            rest: env_is_truthy("REST_DEBUG"),
            sse: env_is_truthy("SSE_DEBUG"),
        }
    }
}

/// Retry envelope applied by the transport to every round-trip.
///
/// `count` is the number of retries after the first attempt. The delay
/// before retry `n` is `wait * 2^(n-1)`, capped at `max_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub count: u32,
    pub wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            count: DEFAULT_RETRY_COUNT,
            wait: DEFAULT_RETRY_WAIT,
            max_wait: DEFAULT_RETRY_MAX_WAIT,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            count: 0,
            wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    pub fn delay(&self, retry_number: u32) -> Duration {
        let shift = retry_number.saturating_sub(1).min(16);
        self.wait.saturating_mul(1u32 << shift).min(self.max_wait)
    }
}

/// Transport-level settings gathered by `ClientBuilder`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub debug: DebugFlags,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            debug: DebugFlags::default(),
        }
    }
}
