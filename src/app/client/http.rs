//! Core HTTP operations with rate limiting
//!
//! Feed and metadata reads go through a rate limiter so a full catalog scan
//! (one metadata request per product) stays polite. Requests are never
//! retried.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::Client;

use crate::constants::http::CACHE_SIGNAL_HEADER;
use crate::errors::{FeedError, FeedResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
    request_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `FeedError::MalformedRecord` if `rate_limit_rps` is zero
    pub fn new(client: Client, rate_limit_rps: u32, request_timeout: Duration) -> FeedResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            request_timeout,
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(rate_limit_rps: u32) -> FeedResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| FeedError::MalformedRecord {
            field: "client.rate_limit_rps".to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Fetches a document body with rate limiting and the request timeout
    ///
    /// # Errors
    ///
    /// Returns `FeedError` if the request fails, times out or the server
    /// answers with a non-success status
    pub async fn get_bytes(&self, url: &str) -> FeedResult<Vec<u8>> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Feed request to {} returned HTTP {}", url, status.as_u16());
            return Err(FeedError::ServerError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }

    /// Asks the caching server whether it already holds `url`
    ///
    /// The caching server omits `Content-Type` on responses it serves from
    /// its store. Any failure counts as "not cached".
    pub async fn probe_cached(&self, url: &str) -> bool {
        match self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => {
                let cached = response.headers().get(CACHE_SIGNAL_HEADER).is_none();
                tracing::debug!("Probe {}: cached={}", url, cached);
                cached
            }
            Err(e) => {
                tracing::debug!("Probe failed for {}: {}", url, e);
                false
            }
        }
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
