use crate::quote::error::MarketDataError;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap};
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// A single HTTP GET. Implementations map transport failures to
/// [`MarketDataError::Network`] and return every status code as a response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, MarketDataError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, MarketDataError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_key: api_key.trim().to_string(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, MarketDataError> {
        let mut http_req_build = self
            .http_client
            .get(url)
            .header(header::ACCEPT, "application/json");

        if !self.api_key.is_empty() {
            http_req_build = http_req_build.header("x-cg-demo-api-key", &self.api_key);
        }

        let response = http_req_build.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
