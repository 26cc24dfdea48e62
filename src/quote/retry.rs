use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Wait(Duration),
    Stop,
}

/// Backoff policy for rate-limited (429) responses.
///
/// Pure function of the attempt count and the response headers; the caller
/// does the sleeping.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_delay: Duration,
    /// Upper bound on any honored `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, default_delay: Duration) -> Self {
        Self {
            max_attempts,
            default_delay,
            max_delay: Duration::from_millis(DEFAULT_MAX_RETRY_DELAY_MS),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// `attempt` is the 1-based number of the request that was just rate limited.
    pub fn next_delay(&self, attempt: u32, headers: &HeaderMap) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Stop;
        }
        RetryDecision::Wait(self.wait_hint(headers))
    }

    /// `Retry-After` in whole seconds when it is a positive integer, else the
    /// default delay. Never longer than `max_delay`.
    pub fn wait_hint(&self, headers: &HeaderMap) -> Duration {
        let hint = headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.default_delay);
        hint.min(self.max_delay)
    }
}
