//! Configuration management for precache
//!
//! This module provides TOML configuration with search-path loading,
//! first-run file generation and zero-config defaults. Every section converts
//! into the runtime value of the component it configures; nothing reads the
//! configuration after construction.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::normalize::sucatalog::default_min_post_date;
use crate::app::{ClientConfig, Criteria, DriverConfig, FeedLocations, LocatorConfig};
use crate::constants::{catalog, feeds, http, locator, logging, throttle};
use crate::errors::{AppError, ConfigError, ConfigResult, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Caching server location
    pub server: ServerConfigToml,
    /// Upstream feed locations
    pub feeds: FeedsConfigToml,
    /// Software update catalog filtering
    pub catalog: CatalogConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Download behaviour
    pub download: DownloadConfigToml,
    /// Default selection criteria
    pub cache: CacheDefaultsToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Caching server location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfigToml {
    /// Caching server URL (`http://host:port`); discovered when unset
    pub url: Option<String>,
    /// Local caching service plists to read the port from
    pub cache_config_plists: Vec<PathBuf>,
    /// Platform utility reporting reachable caching servers
    pub locator_command: PathBuf,
}

impl Default for ServerConfigToml {
    fn default() -> Self {
        Self {
            url: None,
            cache_config_plists: vec![
                PathBuf::from(locator::TETHERATOR_PLIST),
                PathBuf::from(locator::CACHE_SERVER_PLIST),
            ],
            locator_command: PathBuf::from(locator::LOCATOR_COMMAND),
        }
    }
}

/// Upstream feed locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfigToml {
    /// Base URL of the mobile asset feeds
    pub ios_base_url: String,
    /// Base URL of the software update catalog
    pub sucatalog_base_url: String,
    /// Catalog path relative to `sucatalog_base_url`
    pub sucatalog_path: String,
    /// List of cacheable apps and installers
    pub apps_list_url: String,
    /// Firmware lookup template, `{model}` is replaced
    pub ipsw_lookup_url: String,
    /// Device description template, `{model}` is replaced
    pub ipsw_name_url: String,
    /// Mobile feed paths relative to `ios_base_url`
    pub ios_feeds: IosFeedsToml,
}

impl Default for FeedsConfigToml {
    fn default() -> Self {
        Self {
            ios_base_url: feeds::IOS_BASE_URL.to_string(),
            sucatalog_base_url: feeds::SUCATALOG_BASE_URL.to_string(),
            sucatalog_path: feeds::SUCATALOG_PATH.to_string(),
            apps_list_url: feeds::APPS_LIST_URL.to_string(),
            ipsw_lookup_url: feeds::IPSW_LOOKUP_URL.to_string(),
            ipsw_name_url: feeds::IPSW_NAME_URL.to_string(),
            ios_feeds: IosFeedsToml::default(),
        }
    }
}

/// Mobile feed paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IosFeedsToml {
    /// iOS feed
    pub ios: String,
    /// watchOS feed
    pub watch: String,
    /// tvOS feed
    pub tv: String,
}

impl Default for IosFeedsToml {
    fn default() -> Self {
        Self {
            ios: feeds::IOS_FEED.to_string(),
            watch: feeds::WATCH_FEED.to_string(),
            tv: feeds::TV_FEED.to_string(),
        }
    }
}

/// Software update catalog filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfigToml {
    /// Products posted before this date are ignored
    pub min_post_date: NaiveDate,
    /// Products whose title contains any of these are ignored
    pub excludes: Vec<String>,
}

impl Default for CatalogConfigToml {
    fn default() -> Self {
        Self {
            min_post_date: default_min_post_date(),
            excludes: catalog::DEFAULT_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// User agent sent with every request
    pub user_agent: String,
    /// Feed, metadata and lookup request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit for feed reads (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            user_agent: http::USER_AGENT.to_string(),
            timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: http::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// Download behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    /// Directory firmware images are saved to (system temp dir when unset)
    pub destination: Option<PathBuf>,
    /// Lower bound of the pause after each download
    #[serde(with = "humantime_serde")]
    pub throttle_min: Duration,
    /// Upper bound of the pause after each download
    #[serde(with = "humantime_serde")]
    pub throttle_max: Duration,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            destination: None,
            throttle_min: throttle::MIN_DELAY,
            throttle_max: throttle::MAX_DELAY,
        }
    }
}

/// Criteria used when the command line supplies none of a category
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheDefaultsToml {
    /// Device models
    pub models: Vec<String>,
    /// Firmware models
    pub ipsw: Vec<String>,
    /// Asset groups
    pub groups: Vec<String>,
    /// App names
    pub apps: Vec<String>,
    /// Software update product ids or keywords
    pub mac_updates: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the first file found
    ///
    /// An explicitly given file must exist; otherwise the search paths are
    /// tried in order and defaults are used when none exists.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration file
    ///
    /// Uses `path` or the user config location. An existing file is left
    /// alone unless `force` is set. Returns the path and whether it was
    /// written.
    pub async fn initialize_first_run(path: Option<PathBuf>, force: bool) -> Result<(PathBuf, bool)> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_default_config_path()?,
        };

        if config_path.exists() && !force {
            return Ok((config_path, false));
        }

        info!("Creating default configuration file...");

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let config_content = Self::generate_default_config_content()?;

        tokio::fs::write(&config_path, config_content)
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    config_path.display(),
                    e
                ))
            })?;

        Ok((config_path, true))
    }

    /// Search paths, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./precache.toml")];
        if let Ok(user) = Self::get_default_config_path() {
            paths.push(user);
        }
        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/precache/config.toml"));
        paths
    }

    fn find_config_file() -> Option<PathBuf> {
        let found = Self::search_paths().into_iter().find(|path| path.exists());
        if let Some(path) = &found {
            debug!("Found config file: {}", path.display());
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir.join("precache").join("config.toml"))
    }

    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content
    pub fn generate_default_config_content() -> Result<String> {
        let body = toml::to_string_pretty(&Self::default())
            .map_err(|e| AppError::generic(format!("Failed to render default config: {}", e)))?;

        Ok(format!(
            "# precache configuration\n\
             # Durations accept humantime values such as \"10s\" or \"1500ms\".\n\
             # Set [server] url to skip caching server discovery.\n\
             # [cache] lists are used when the command line names none of that kind.\n\n{}",
            body
        ))
    }

    /// Check values that would otherwise fail late
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.server.url {
            crate::app::CacheServer::parse(url)?;
        }
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }
        if self.download.throttle_min > self.download.throttle_max {
            return Err(ConfigError::InvalidValue {
                field: "download.throttle_min".to_string(),
                value: format!("{:?}", self.download.throttle_min),
                reason: "Must not exceed download.throttle_max".to_string(),
            });
        }
        Ok(())
    }
}

impl ServerConfigToml {
    /// Convert to runtime LocatorConfig; `url_override` wins over the file
    pub fn to_locator_config(&self, url_override: Option<String>) -> LocatorConfig {
        LocatorConfig {
            server_url: url_override.or_else(|| self.url.clone()),
            config_plists: self.cache_config_plists.clone(),
            locator_command: self.locator_command.clone(),
        }
    }
}

fn join_url(base: &str, path: &str, field: &str) -> ConfigResult<String> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: field.to_string(),
        value: base.to_string(),
        reason,
    };
    let base = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    base.join(path)
        .map(|url| url.to_string())
        .map_err(|e| invalid(e.to_string()))
}

impl FeedsConfigToml {
    /// Convert to runtime FeedLocations
    pub fn to_feed_locations(&self) -> ConfigResult<FeedLocations> {
        let mobile_feeds = [&self.ios_feeds.ios, &self.ios_feeds.watch, &self.ios_feeds.tv]
            .iter()
            .map(|feed| join_url(&self.ios_base_url, feed, "feeds.ios_base_url"))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(FeedLocations {
            mobile_feeds,
            sucatalog_url: join_url(
                &self.sucatalog_base_url,
                &self.sucatalog_path,
                "feeds.sucatalog_base_url",
            )?,
            apps_list_url: self.apps_list_url.clone(),
            ipsw_lookup_url: self.ipsw_lookup_url.clone(),
            ipsw_name_url: self.ipsw_name_url.clone(),
        })
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            user_agent: self.user_agent.clone(),
            request_timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
        }
    }
}

impl DownloadConfigToml {
    /// Convert to runtime DriverConfig
    pub fn to_driver_config(&self, destination: Option<PathBuf>, dry_run: bool) -> DriverConfig {
        DriverConfig {
            destination: destination
                .or_else(|| self.destination.clone())
                .unwrap_or_else(std::env::temp_dir),
            dry_run,
            throttle_min: self.throttle_min,
            throttle_max: self.throttle_max,
        }
    }
}

impl CacheDefaultsToml {
    /// Convert to default Criteria
    pub fn to_criteria(&self) -> Criteria {
        fn set(items: &[String]) -> BTreeSet<String> {
            items.iter().cloned().collect()
        }

        Criteria {
            models: set(&self.models),
            groups: set(&self.groups),
            apps: set(&self.apps),
            mac_updates: set(&self.mac_updates),
            firmware_models: set(&self.ipsw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.client.rate_limit_rps, http::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.client.timeout, Duration::from_secs(10));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.catalog.min_post_date.to_string(), "2015-09-30");
        assert!(config.catalog.excludes.iter().any(|e| e == "iPhoto"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_generation() {
        let content = AppConfig::generate_default_config_content().unwrap();

        let parsed: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.client.timeout, Duration::from_secs(10));
        assert_eq!(parsed.catalog.excludes, AppConfig::default().catalog.excludes);
        assert!(content.starts_with("# precache configuration"));
        assert!(content.contains("[client]"));
        assert!(content.contains("[feeds.ios_feeds]"));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_config_loading_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("precache.toml");

        let test_config = r#"
[server]
url = "http://thor:49672"

[client]
timeout = "30s"

[download]
destination = "/Users/Shared/ipsw"
throttle_min = "0s"
throttle_max = "500ms"

[cache]
models = ["iPad6,8"]
mac_updates = ["Sierra"]

[logging]
level = "debug"
"#;

        tokio::fs::write(&config_path, test_config).await.unwrap();

        let config = AppConfig::load(Some(config_path)).await.unwrap();

        assert_eq!(config.server.url.as_deref(), Some("http://thor:49672"));
        assert_eq!(config.client.timeout, Duration::from_secs(30));
        assert_eq!(config.download.throttle_max, Duration::from_millis(500));
        assert_eq!(config.logging.level, "debug");

        // Unspecified values keep their defaults
        assert_eq!(config.client.rate_limit_rps, http::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.feeds.apps_list_url, feeds::APPS_LIST_URL);

        let criteria = config.cache.to_criteria();
        assert!(criteria.models.contains("iPad6,8"));
        assert!(criteria.mac_updates.contains("Sierra"));
        assert!(criteria.apps.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_server_url_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("precache.toml");
        tokio::fs::write(&config_path, "[server]\nurl = \"https://thor\"\n")
            .await
            .unwrap();

        assert!(AppConfig::load(Some(config_path)).await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_first_run() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let (written, created) = AppConfig::initialize_first_run(Some(path.clone()), false)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(written, path);
        assert!(AppConfig::load(Some(path.clone())).await.is_ok());

        let (_, created) = AppConfig::initialize_first_run(Some(path), false)
            .await
            .unwrap();
        assert!(!created);
    }

    #[test]
    fn test_feed_locations() {
        let locations = FeedsConfigToml::default().to_feed_locations().unwrap();
        assert_eq!(locations, FeedLocations::default());
        assert_eq!(locations.mobile_feeds.len(), 3);
        assert!(locations.sucatalog_url.starts_with("https://swscan.apple.com/content/"));
    }

    #[test]
    fn test_driver_config_destination_precedence() {
        let download = DownloadConfigToml {
            destination: Some(PathBuf::from("/from/config")),
            ..Default::default()
        };
        assert_eq!(
            download.to_driver_config(Some(PathBuf::from("/from/cli")), false).destination,
            PathBuf::from("/from/cli")
        );
        assert_eq!(
            download.to_driver_config(None, true).destination,
            PathBuf::from("/from/config")
        );
    }
}
