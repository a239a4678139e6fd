//! Cacheable Mac apps and installers
//!
//! The app list is a property-list dictionary keyed by app name, each entry
//! carrying `version`, `url` and `type` (`app` or `installer`).

use serde::Deserialize;
use tracing::warn;

use crate::app::models::Asset;
use crate::app::proxy::CacheServer;
use crate::errors::{FeedError, FeedResult};

/// One entry of the app list
#[derive(Debug, Clone, Deserialize)]
pub struct AppRecord {
    /// Published version
    pub version: Option<String>,
    /// Origin download URL
    pub url: String,
    /// Declared asset group, `app` or `installer`
    #[serde(rename = "type")]
    pub kind: String,
}

/// Adapter from app list entries to assets
#[derive(Debug, Clone)]
pub struct AppAdapter {
    server: CacheServer,
    host_model: Option<String>,
}

impl AppAdapter {
    /// Create an adapter; `host_model` is recorded as each asset's model
    pub fn new(server: CacheServer, host_model: Option<String>) -> Self {
        Self { server, host_model }
    }

    /// Normalize one named entry
    pub fn normalize_record(&self, name: &str, record: &AppRecord) -> FeedResult<Asset> {
        Ok(Asset {
            model: self.host_model.clone(),
            version: record.version.clone(),
            urls: vec![self.server.reformat(&record.url)?],
            group: record.kind.clone(),
            product_title: Some(name.to_string()),
            ..Default::default()
        })
    }

    /// Lazily normalize a parsed app list
    ///
    /// Yields assets in document order; single-pass. Entries that fail to
    /// deserialize are logged and skipped.
    pub fn normalize(&self, list: plist::Value) -> FeedResult<impl Iterator<Item = Asset> + '_> {
        let plist::Value::Dictionary(entries) = list else {
            return Err(FeedError::MalformedRecord {
                field: "apps".to_string(),
                reason: "app list root is not a dictionary".to_string(),
            });
        };

        Ok(entries.into_iter().filter_map(move |(name, raw)| {
            let record: AppRecord = match plist::from_value(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed app entry {}: {}", name, e);
                    return None;
                }
            };
            match self.normalize_record(&name, &record) {
                Ok(asset) => Some(asset),
                Err(e) => {
                    warn!("Skipping app {}: {}", name, e);
                    None
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Value};

    fn entry(version: &str, url: &str, kind: &str) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("version".to_string(), Value::String(version.to_string()));
        dict.insert("url".to_string(), Value::String(url.to_string()));
        dict.insert("type".to_string(), Value::String(kind.to_string()));
        Value::Dictionary(dict)
    }

    #[test]
    fn test_normalize_app_list() {
        let mut list = Dictionary::new();
        list.insert(
            "Server".to_string(),
            entry(
                "5.3",
                "http://osxapps.itunes.apple.com/apple-assets-us-std-000001/Server.pkg",
                "app",
            ),
        );
        list.insert(
            "Sierra".to_string(),
            entry(
                "10.12.6",
                "http://osxapps.itunes.apple.com/apple-assets-us-std-000001/InstallOS.pkg",
                "installer",
            ),
        );
        list.insert("Broken".to_string(), Value::String("nope".to_string()));

        let adapter = AppAdapter::new(
            CacheServer::new("thor", 49672),
            Some("MacBookPro14,3".to_string()),
        );
        let assets: Vec<Asset> = adapter.normalize(Value::Dictionary(list)).unwrap().collect();

        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].product_title.as_deref(), Some("Server"));
        assert_eq!(assets[0].group, "app");
        assert_eq!(assets[0].model.as_deref(), Some("MacBookPro14,3"));
        assert_eq!(
            assets[0].urls,
            vec!["http://thor:49672/apple-assets-us-std-000001/Server.pkg?source=osxapps.itunes.apple.com"]
        );
        assert_eq!(assets[1].group, "installer");
        assert_eq!(assets[1].version.as_deref(), Some("10.12.6"));
    }

    #[test]
    fn test_non_dictionary_list_rejected() {
        let adapter = AppAdapter::new(CacheServer::new("thor", 1), None);
        assert!(adapter.normalize(Value::Array(vec![])).is_err());
    }
}
