//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! shared by feed reads, cache probes and downloads.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::http;
use crate::errors::{FeedError, FeedResult};

/// Configuration for the HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// User agent sent with every request
    pub user_agent: String,
    /// Timeout for feed, metadata and lookup requests
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Rate limit for feed and metadata reads (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: http::USER_AGENT.to_string(),
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: http::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    ///
    /// No overall timeout is set on the client itself: firmware images take
    /// far longer than any feed read, so feed requests apply
    /// `request_timeout` individually.
    pub fn build_http_client(&self) -> FeedResult<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .tcp_nodelay(true)
            .build()
            .map_err(FeedError::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent, "precache");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.rate_limit_rps, http::DEFAULT_RATE_LIMIT_RPS);
    }

    #[test]
    fn test_http_client_creation() {
        let config = ClientConfig {
            user_agent: "precache-test".to_string(),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(config.build_http_client().is_ok());
    }
}
