//! HTTP client for feeds and the caching server
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Rate-limited feed reads and cache probes
//! - `download`: Priming and firmware downloads through the caching server

use std::path::Path;

use async_trait::async_trait;

use crate::app::driver::CacheTransport;
use crate::app::feed::FeedReader;
use crate::errors::{DownloadResult, FeedResult};

pub mod config;
pub mod download;
pub mod http;

pub use config::ClientConfig;

use download::DownloadHandler;
use http::HttpHandler;

/// HTTP client used for every network operation of a run
#[derive(Debug)]
pub struct PrecacheClient {
    http_handler: HttpHandler,
}

impl PrecacheClient {
    /// Creates a client with default configuration
    pub fn new() -> FeedResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a client with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `FeedError` if the HTTP client cannot be built or the rate
    /// limit is zero
    pub fn with_config(config: ClientConfig) -> FeedResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.rate_limit_rps, config.request_timeout)?;

        tracing::debug!("Created HTTP client with user agent {}", config.user_agent);

        Ok(Self { http_handler })
    }
}

#[async_trait]
impl FeedReader for PrecacheClient {
    async fn fetch(&self, url: &str) -> FeedResult<Vec<u8>> {
        self.http_handler.get_bytes(url).await
    }
}

#[async_trait]
impl CacheTransport for PrecacheClient {
    async fn is_cached(&self, url: &str) -> bool {
        self.http_handler.probe_cached(url).await
    }

    async fn prime(&self, url: &str) -> DownloadResult<()> {
        DownloadHandler::new(&self.http_handler)
            .prime(url)
            .await
            .map(|_| ())
    }

    async fn download_to(&self, url: &str, destination: &Path) -> DownloadResult<()> {
        DownloadHandler::new(&self.http_handler)
            .download_file(url, destination)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(PrecacheClient::new().is_ok());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let config = ClientConfig {
            rate_limit_rps: 0,
            ..Default::default()
        };
        assert!(PrecacheClient::with_config(config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_feed_fails() {
        let config = ClientConfig {
            request_timeout: std::time::Duration::from_millis(500),
            ..Default::default()
        };
        let client = PrecacheClient::with_config(config).unwrap();
        assert!(client.fetch("http://127.0.0.1:9/feed.xml").await.is_err());
    }
}
