use crate::quote::request::MAX_BATCH_SIZE;
use crate::quote::retry::{
    RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RETRY_DELAY_MS, DEFAULT_RETRY_DELAY_MS,
};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coingecko_api_key: String, // Optional CoinGecko demo API key, sent as `x-cg-demo-api-key` when set
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String, // Base URL of the market data API
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64, // Per-request timeout, in seconds
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32, // Requests made for one batch before giving up on rate limiting
    #[serde(default = "default_retry_delay_ms")]
    pub default_retry_delay_ms: u64, // Backoff when the provider sends no usable `Retry-After`, in milliseconds
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64, // Longest `Retry-After` that is honored, in milliseconds
    #[serde(default = "default_batch_size")]
    pub batch_size: usize, // Ids per `/coins/markets` request, capped at the provider limit
    #[serde(default = "default_watchlist_path")]
    pub watchlist_path: String, // JSON file holding the persisted watchlist
    #[serde(default = "default_watchlist_key")]
    pub watchlist_key: String, // Key the id list is stored under in that file
    #[serde(default = "default_log_level")]
    pub log_level: String, // trace, debug, info, warn or error
}

fn default_api_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_max_retry_delay_ms() -> u64 {
    DEFAULT_MAX_RETRY_DELAY_MS
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_watchlist_path() -> String {
    "watchlist.json".to_string()
}

fn default_watchlist_key() -> String {
    "userCryptos".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.default_retry_delay_ms),
        )
        .with_max_delay(Duration::from_millis(self.max_retry_delay_ms))
    }

    pub fn log_level(&self) -> Level {
        Level::from_str(self.log_level.trim()).unwrap_or(Level::INFO)
    }
}
