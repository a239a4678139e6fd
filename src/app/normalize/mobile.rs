//! iOS, watchOS and tvOS software update feeds
//!
//! Each feed is a property list whose `Assets` array holds one record per
//! update and device set. Records are typed with serde, so an absent field is
//! simply `None` while a field of the wrong type rejects that record alone.

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{strip_digits, title_prefix};
use crate::app::models::Asset;
use crate::app::proxy::CacheServer;
use crate::constants::devices;
use crate::errors::{FeedError, FeedResult};

/// One record of a mobile asset feed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MobileRecord {
    /// Compatible device models, the first is used as the asset's model
    #[serde(rename = "SupportedDevices", default)]
    pub supported_devices: Vec<String>,
    /// OS version
    #[serde(rename = "OSVersion")]
    pub os_version: Option<String>,
    /// OS build
    #[serde(rename = "Build")]
    pub build: Option<String>,
    /// Full update location, preferred when present
    #[serde(rename = "RealUpdateAttributes")]
    pub real_update_attributes: Option<RealUpdateAttributes>,
    /// Base URL for relative update paths
    #[serde(rename = "__BaseURL")]
    pub base_url: Option<String>,
    /// Update path relative to `__BaseURL`
    #[serde(rename = "__RelativePath")]
    pub relative_path: Option<String>,
}

/// Nested attributes carrying the full update URL
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealUpdateAttributes {
    /// Absolute update URL
    #[serde(rename = "RealUpdateURL")]
    pub real_update_url: Option<String>,
}

/// Device model of a record
pub fn device_model(record: &MobileRecord) -> Option<&str> {
    record.supported_devices.first().map(String::as_str)
}

/// Device family of a model: digits and commas removed
///
/// ```rust
/// use precache::app::normalize::mobile::device_group;
///
/// assert_eq!(device_group("iPad6,8"), "iPad");
/// assert_eq!(device_group("AppleTV5,3"), "AppleTV");
/// ```
pub fn device_group(model: &str) -> String {
    strip_digits(&model.replace(',', ""))
}

/// OS version with the stray `9.9.` prefix removed
pub fn update_version(record: &MobileRecord) -> Option<String> {
    record.os_version.as_deref().map(|version| {
        version
            .strip_prefix(devices::BOGUS_VERSION_PREFIX)
            .unwrap_or(version)
            .to_string()
    })
}

/// Build identifier, or placeholder text when absent
pub fn update_build(record: &MobileRecord) -> &str {
    record.build.as_deref().unwrap_or(devices::NO_BUILD)
}

/// Origin download URL of a record
///
/// `RealUpdateURL` wins; otherwise `__BaseURL` is joined with
/// `__RelativePath`.
pub fn origin_url(record: &MobileRecord) -> FeedResult<String> {
    if let Some(url) = record
        .real_update_attributes
        .as_ref()
        .and_then(|attrs| attrs.real_update_url.as_deref())
    {
        return Ok(url.to_string());
    }

    match (record.base_url.as_deref(), record.relative_path.as_deref()) {
        (Some(base), Some(relative)) => {
            let base = Url::parse(base).map_err(|e| FeedError::MalformedRecord {
                field: "__BaseURL".to_string(),
                reason: e.to_string(),
            })?;
            let joined = base.join(relative).map_err(|e| FeedError::MalformedRecord {
                field: "__RelativePath".to_string(),
                reason: e.to_string(),
            })?;
            Ok(joined.to_string())
        }
        _ => Err(FeedError::MalformedRecord {
            field: "__RelativePath".to_string(),
            reason: "record has neither RealUpdateURL nor __BaseURL/__RelativePath".to_string(),
        }),
    }
}

/// Display title of a record
///
/// `"{prefix} {version} build {build}"`, or `"{model} Update"` when the OS
/// prefix or version cannot be determined.
pub fn update_title(record: &MobileRecord) -> String {
    let model = device_model(record).unwrap_or("");

    match (title_prefix(model), update_version(record)) {
        (Some(prefix), Some(version)) => {
            format!("{} {} build {}", prefix, version, update_build(record))
        }
        _ => format!("{} Update", model),
    }
}

/// Extract the `Assets` array from a parsed mobile feed
pub fn feed_records(feed: plist::Value) -> FeedResult<Vec<plist::Value>> {
    match feed {
        plist::Value::Dictionary(mut dict) => match dict.remove("Assets") {
            Some(plist::Value::Array(records)) => Ok(records),
            Some(_) => Err(FeedError::MalformedRecord {
                field: "Assets".to_string(),
                reason: "expected an array".to_string(),
            }),
            None => Err(FeedError::MalformedRecord {
                field: "Assets".to_string(),
                reason: "feed has no Assets".to_string(),
            }),
        },
        _ => Err(FeedError::MalformedRecord {
            field: "Assets".to_string(),
            reason: "feed root is not a dictionary".to_string(),
        }),
    }
}

/// Adapter from mobile feed records to assets
#[derive(Debug, Clone)]
pub struct MobileAdapter {
    server: CacheServer,
}

impl MobileAdapter {
    /// Create an adapter formatting URLs for `server`
    pub fn new(server: CacheServer) -> Self {
        Self { server }
    }

    /// Normalize a single record
    ///
    /// Returns `Ok(None)` for records that name no device.
    pub fn normalize_record(&self, record: &MobileRecord) -> FeedResult<Option<Asset>> {
        let Some(model) = device_model(record) else {
            return Ok(None);
        };

        let url = self.server.reformat(&origin_url(record)?)?;

        Ok(Some(Asset {
            model: Some(model.to_string()),
            version: update_version(record),
            urls: vec![url],
            group: device_group(model),
            product_title: Some(update_title(record)),
            ..Default::default()
        }))
    }

    /// Lazily normalize raw feed records
    ///
    /// The returned iterator is finite and single-pass. Records that do not
    /// deserialize or carry no usable URL are logged and skipped.
    pub fn normalize(
        &self,
        records: Vec<plist::Value>,
    ) -> impl Iterator<Item = Asset> + '_ {
        records.into_iter().filter_map(move |raw| {
            let record: MobileRecord = match plist::from_value(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed mobile update record: {}", e);
                    return None;
                }
            };

            match self.normalize_record(&record) {
                Ok(Some(asset)) => Some(asset),
                Ok(None) => {
                    debug!("Skipping mobile update record without devices");
                    None
                }
                Err(e) => {
                    warn!(
                        "Skipping mobile update for {}: {}",
                        device_model(&record).unwrap_or("unknown model"),
                        e
                    );
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Value};

    fn record(model: &str) -> MobileRecord {
        MobileRecord {
            supported_devices: vec![model.to_string()],
            os_version: Some("10.3.2".to_string()),
            build: Some("14F89".to_string()),
            real_update_attributes: None,
            base_url: Some("http://appldnld.apple.com/ios10.3.2/".to_string()),
            relative_path: Some("091-12345/update.zip".to_string()),
        }
    }

    fn server() -> CacheServer {
        CacheServer::new("thor", 49672)
    }

    #[test]
    fn test_device_group() {
        assert_eq!(device_group("iPad6,8"), "iPad");
        assert_eq!(device_group("AppleTV5,3"), "AppleTV");
        assert_eq!(device_group("Watch2,3"), "Watch");
    }

    #[test]
    fn test_update_version_strips_bogus_prefix() {
        let mut rec = record("iPhone9,1");
        rec.os_version = Some("9.9.10.3.2".to_string());
        assert_eq!(update_version(&rec).as_deref(), Some("10.3.2"));

        rec.os_version = None;
        assert_eq!(update_version(&rec), None);
    }

    #[test]
    fn test_missing_build_placeholder() {
        let mut rec = record("iPad6,8");
        rec.build = None;
        assert_eq!(update_build(&rec), "No build found");
        assert_eq!(update_title(&rec), "iOS 10.3.2 build No build found");
    }

    #[test]
    fn test_update_title_variants() {
        assert_eq!(update_title(&record("iPad6,8")), "iOS 10.3.2 build 14F89");
        assert_eq!(update_title(&record("Watch2,3")), "watchOS 10.3.2 build 14F89");
        assert_eq!(update_title(&record("AppleTV5,3")), "tvOS 10.3.2 build 14F89");

        let mut rec = record("iPad6,8");
        rec.os_version = None;
        assert_eq!(update_title(&rec), "iPad6,8 Update");

        assert_eq!(update_title(&record("AudioAccessory1,1")), "AudioAccessory1,1 Update");
    }

    #[test]
    fn test_origin_url_prefers_real_update_url() {
        let mut rec = record("iPad6,8");
        assert_eq!(
            origin_url(&rec).unwrap(),
            "http://appldnld.apple.com/ios10.3.2/091-12345/update.zip"
        );

        rec.real_update_attributes = Some(RealUpdateAttributes {
            real_update_url: Some("http://appldnld.apple.com/real/full.zip".to_string()),
        });
        assert_eq!(
            origin_url(&rec).unwrap(),
            "http://appldnld.apple.com/real/full.zip"
        );

        rec.real_update_attributes = None;
        rec.base_url = None;
        assert!(matches!(
            origin_url(&rec),
            Err(FeedError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_normalize_record() {
        let adapter = MobileAdapter::new(server());
        let asset = adapter.normalize_record(&record("iPad6,8")).unwrap().unwrap();

        assert_eq!(asset.model.as_deref(), Some("iPad6,8"));
        assert_eq!(asset.group, "iPad");
        assert_eq!(asset.version.as_deref(), Some("10.3.2"));
        assert_eq!(
            asset.urls,
            vec!["http://thor:49672/ios10.3.2/091-12345/update.zip?source=appldnld.apple.com"]
        );
        assert_eq!(asset.product_title.as_deref(), Some("iOS 10.3.2 build 14F89"));
    }

    #[test]
    fn test_normalize_skips_malformed_records() {
        let mut good = Dictionary::new();
        good.insert(
            "SupportedDevices".to_string(),
            Value::Array(vec![Value::String("iPhone9,1".to_string())]),
        );
        good.insert("OSVersion".to_string(), Value::String("10.3.2".to_string()));
        good.insert(
            "__BaseURL".to_string(),
            Value::String("http://appldnld.apple.com/".to_string()),
        );
        good.insert(
            "__RelativePath".to_string(),
            Value::String("a/b.zip".to_string()),
        );

        let mut wrong_type = Dictionary::new();
        wrong_type.insert("SupportedDevices".to_string(), Value::Integer(5.into()));

        let mut no_devices = Dictionary::new();
        no_devices.insert("OSVersion".to_string(), Value::String("10.0".to_string()));

        let records = vec![
            Value::Dictionary(wrong_type),
            Value::Dictionary(no_devices),
            Value::Dictionary(good),
        ];

        let adapter = MobileAdapter::new(server());
        let assets: Vec<Asset> = adapter.normalize(records).collect();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].model.as_deref(), Some("iPhone9,1"));
    }

    #[test]
    fn test_feed_records() {
        let mut feed = Dictionary::new();
        feed.insert("Assets".to_string(), Value::Array(vec![Value::Boolean(true)]));
        assert_eq!(feed_records(Value::Dictionary(feed)).unwrap().len(), 1);

        assert!(feed_records(Value::Dictionary(Dictionary::new())).is_err());
        assert!(feed_records(Value::Boolean(false)).is_err());
    }
}
