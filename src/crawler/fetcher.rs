//! Page fetching capability.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;

use crate::core::config::settings::CrawlerSettings;
use crate::core::errors::ApiError;

/// `fetch(url) -> raw HTML`; fails on timeout or navigation failure.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ApiError>;
}

/// HTTP fetcher with an explicit per-request timeout and a rate limiter
/// pacing outbound requests across all concurrent runs.
pub struct HttpFetcher {
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl HttpFetcher {
    pub fn new(settings: &CrawlerSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.fetch_timeout_secs))
            .user_agent(concat!("sitechat-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::internal)?;

        let per_second = NonZeroU32::new(settings.requests_per_sec).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self { client, limiter })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ApiError> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::upstream("fetch", e))?;

        if !response.status().is_success() {
            return Err(ApiError::upstream(
                "fetch",
                format!("{} returned {}", url, response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::upstream("fetch", e))
    }
}
