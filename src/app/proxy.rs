//! Caching server addressing and URL rewriting
//!
//! Requests are primed through the caching server by rewriting an origin
//! download URL into `http://<host>:<port><path>?source=<origin-host>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{ConfigError, ConfigResult, FeedError, FeedResult};

/// Address of the caching server requests are routed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheServer {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl CacheServer {
    /// Create a caching server address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse and validate a `http://host:port` server URL
    ///
    /// Caching servers only speak plain HTTP and always listen on an explicit
    /// port, so anything else is rejected.
    pub fn parse(server_url: &str) -> ConfigResult<Self> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "server.url".to_string(),
            value: server_url.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(server_url).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("Caching servers only accept http"));
        }
        let host = url
            .host_str()
            .ok_or_else(|| invalid("No host in server URL"))?;
        let port = url.port().ok_or_else(|| invalid("No port in server URL"))?;

        Ok(Self::new(host, port))
    }

    /// Rewrite an origin URL into the caching server request form
    pub fn reformat(&self, origin_url: &str) -> FeedResult<String> {
        reformat_url(origin_url, &self.host, self.port)
    }
}

impl fmt::Display for CacheServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}", self.host, self.port)
    }
}

impl FromStr for CacheServer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Rewrite `origin_url` to be requested through the caching server
///
/// Only ever applied to untouched origin URLs; an existing query string on the
/// origin is dropped along with its scheme and host.
///
/// # Examples
///
/// ```rust
/// use precache::app::proxy::reformat_url;
///
/// let url = reformat_url("https://swcdn.apple.com/path/file.pkg", "thor", 49672)?;
/// assert_eq!(url, "http://thor:49672/path/file.pkg?source=swcdn.apple.com");
/// # Ok::<(), precache::errors::FeedError>(())
/// ```
pub fn reformat_url(origin_url: &str, proxy_host: &str, proxy_port: u16) -> FeedResult<String> {
    let url = Url::parse(origin_url).map_err(|e| FeedError::InvalidUrl {
        url: origin_url.to_string(),
        error: e.to_string(),
    })?;

    let source = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(FeedError::InvalidUrl {
                url: origin_url.to_string(),
                error: "URL has no host".to_string(),
            })
        }
    };

    Ok(format!(
        "http://{}:{}{}?source={}",
        proxy_host,
        proxy_port,
        url.path(),
        source
    ))
}

/// Basename of a (possibly proxy-formatted) URL without its query string
pub fn display_filename(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reformat_url() {
        let url = reformat_url("https://swcdn.apple.com/path/file.pkg", "thor", 49672).unwrap();
        assert_eq!(url, "http://thor:49672/path/file.pkg?source=swcdn.apple.com");
    }

    #[test]
    fn test_reformat_drops_origin_query() {
        let server = CacheServer::new("localhost", 53612);
        let url = server
            .reformat("http://appldnld.apple.com/ios10.3/091-02919.zip?x=1")
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:53612/ios10.3/091-02919.zip?source=appldnld.apple.com"
        );
    }

    #[test]
    fn test_reformat_invalid_url() {
        assert!(reformat_url("not a url", "thor", 1).is_err());
    }

    #[test]
    fn test_parse_server() {
        let server = CacheServer::parse("http://cacheserver:53612").unwrap();
        assert_eq!(server, CacheServer::new("cacheserver", 53612));
        assert_eq!(server.to_string(), "http://cacheserver:53612");

        assert!(CacheServer::parse("https://cacheserver:53612").is_err());
        assert!(CacheServer::parse("http://cacheserver").is_err());
        assert!("garbage".parse::<CacheServer>().is_err());
    }

    #[test]
    fn test_display_filename() {
        assert_eq!(
            display_filename("http://thor:49672/path/Safari10.1ElCapitan.pkg?source=swcdn.apple.com"),
            "Safari10.1ElCapitan.pkg"
        );
        assert_eq!(display_filename("file.ipsw"), "file.ipsw");
    }
}
