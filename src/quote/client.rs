use crate::quote::error::MarketDataError;
use crate::quote::request::{markets_url, search_url, MAX_BATCH_SIZE};
use crate::quote::response::{parse_markets, AssetRecord};
use crate::quote::retry::{RetryDecision, RetryPolicy};
use crate::quote::search::{SearchHit, SearchResponse};
use crate::quote::transport::HttpTransport;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Anything that can turn a set of ids into market records.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_market_data(
        &self,
        ids: &[String],
    ) -> Result<Vec<AssetRecord>, MarketDataError>;
}

pub struct MarketDataClient<T> {
    transport: T,
    base_url: String,
    retry_policy: RetryPolicy,
    batch_size: usize,
}

impl<T: HttpTransport> MarketDataClient<T> {
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.to_string(),
            retry_policy: RetryPolicy::default(),
            batch_size: MAX_BATCH_SIZE,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Clamped to `1..=MAX_BATCH_SIZE`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Fetches records for `ids`, one request per batch of at most `batch_size` ids.
    ///
    /// Empty input returns without touching the network. Duplicate ids are
    /// collapsed, and ids the provider doesn't know are simply absent from
    /// the result.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn fetch_market_data(
        &self,
        ids: &[String],
    ) -> Result<Vec<AssetRecord>, MarketDataError> {
        let mut seen = HashSet::new();
        let unique_ids: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        if unique_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(unique_ids.len());
        let mut returned_ids = HashSet::new();

        for batch in unique_ids.chunks(self.batch_size) {
            for record in self.fetch_batch(batch).await? {
                if returned_ids.insert(record.id.clone()) {
                    records.push(record);
                } else {
                    warn!("Provider returned {} twice, keeping the first entry", record.id);
                }
            }
        }

        Ok(records)
    }

    async fn fetch_batch(&self, batch: &[String]) -> Result<Vec<AssetRecord>, MarketDataError> {
        let url = markets_url(&self.base_url, batch);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Requesting market data for {} id(s), attempt {}",
                batch.len(),
                attempt
            );

            let response = self.transport.get(&url).await?;

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                match self.retry_policy.next_delay(attempt, &response.headers) {
                    RetryDecision::Wait(delay) => {
                        warn!(
                            "Rate limited, retrying after {}ms ({} attempt(s) left)",
                            delay.as_millis(),
                            self.retry_policy.max_attempts.saturating_sub(attempt)
                        );
                        sleep(delay).await;
                        continue;
                    }
                    RetryDecision::Stop => {
                        let hint = self.retry_policy.wait_hint(&response.headers);
                        warn!("Rate limited {} time(s), giving up", attempt);
                        return Err(MarketDataError::RateLimitExceeded {
                            last_wait_hint_ms: u64::try_from(hint.as_millis())
                                .unwrap_or(u64::MAX),
                        });
                    }
                }
            }

            if !response.status.is_success() {
                return Err(MarketDataError::Upstream {
                    status: response.status.as_u16(),
                });
            }

            let records = parse_markets(&response.body)?;
            debug!(
                "Provider recognized {} of {} requested id(s)",
                records.len(),
                batch.len()
            );
            return Ok(records);
        }
    }

    /// One-shot coin lookup by name or symbol. No retry.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MarketDataError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.transport.get(&search_url(&self.base_url, query)).await?;
        if !response.status.is_success() {
            return Err(MarketDataError::Upstream {
                status: response.status.as_u16(),
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&response.body)?;
        Ok(parsed.coins)
    }
}

#[async_trait]
impl<T: HttpTransport> MarketDataSource for MarketDataClient<T> {
    async fn fetch_market_data(
        &self,
        ids: &[String],
    ) -> Result<Vec<AssetRecord>, MarketDataError> {
        MarketDataClient::fetch_market_data(self, ids).await
    }
}
