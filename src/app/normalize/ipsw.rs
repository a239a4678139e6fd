//! Firmware images from the third-party lookup service
//!
//! The lookup service answers `latest/info.json` per device model with a
//! JSON array whose first element describes the newest signed firmware.
//! Firmware availability is best-effort: any failure for one model yields no
//! asset for that model and never affects other models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::title_prefix;
use crate::app::feed::{read_json, read_text, FeedReader};
use crate::app::hash::Sha1Digest;
use crate::app::models::Asset;
use crate::app::proxy::CacheServer;
use crate::constants::{devices, groups};
use crate::errors::{LookupError, LookupResult};

/// Firmware metadata returned by the lookup service
#[derive(Debug, Clone, Deserialize)]
pub struct FirmwareRecord {
    /// Human-readable device name
    pub device: String,
    /// Firmware OS version
    pub version: String,
    /// Firmware build
    pub buildid: String,
    /// Origin download URL of the image
    pub url: String,
    /// SHA-1 of the image
    pub sha1sum: Option<String>,
    /// Release date, preferred
    pub releasedate: Option<String>,
    /// Upload date, used when no release date is published
    pub uploaddate: Option<String>,
}

/// Parse a date as published by the lookup service
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM:SS` and bare dates.
pub fn parse_release_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Adapter from lookup-service records to firmware assets
#[derive(Debug, Clone)]
pub struct FirmwareAdapter {
    server: CacheServer,
    lookup_url: String,
    name_url: String,
}

impl FirmwareAdapter {
    /// Create an adapter
    ///
    /// `lookup_url` and `name_url` are templates in which `{model}` is
    /// replaced by the device model.
    pub fn new(
        server: CacheServer,
        lookup_url: impl Into<String>,
        name_url: impl Into<String>,
    ) -> Self {
        Self {
            server,
            lookup_url: lookup_url.into(),
            name_url: name_url.into(),
        }
    }

    /// Lookup URL for a model
    pub fn lookup_url_for(&self, model: &str) -> String {
        self.lookup_url.replace("{model}", model)
    }

    /// Build the firmware asset for `model` from a lookup record
    pub fn asset_from_record(&self, model: &str, record: &FirmwareRecord) -> LookupResult<Asset> {
        let failed = |reason: String| LookupError::LookupFailed {
            model: model.to_string(),
            reason,
        };

        let prefix =
            title_prefix(model).ok_or_else(|| failed("unknown device family".to_string()))?;
        let url = self
            .server
            .reformat(&record.url)
            .map_err(|e| failed(e.to_string()))?;

        let release_date = record
            .releasedate
            .as_deref()
            .or(record.uploaddate.as_deref())
            .and_then(|text| {
                let parsed = parse_release_date(text);
                if parsed.is_none() {
                    debug!("Unrecognised firmware date {:?} for {}", text, model);
                }
                parsed
            });

        let sha_digest = match record.sha1sum.as_deref() {
            Some(hex) => Some(Sha1Digest::from_hex(hex).map_err(|e| failed(e.to_string()))?),
            None => None,
        };

        Ok(Asset {
            model: Some(model.to_string()),
            model_description: Some(record.device.clone()),
            version: Some(record.version.clone()),
            urls: vec![url],
            group: groups::IPSW.to_string(),
            product_title: Some(format!(
                "{} {} build {} (ipsw)",
                prefix, record.version, record.buildid
            )),
            release_date,
            sha_digest,
            ..Default::default()
        })
    }

    /// Look up the latest firmware for one model
    ///
    /// # Errors
    ///
    /// `LookupError::NotSupported` for watch models, `LookupError::LookupFailed`
    /// for any service or parse failure
    pub async fn lookup<R>(&self, reader: &R, model: &str) -> LookupResult<Asset>
    where
        R: FeedReader + ?Sized,
    {
        if model.contains(devices::WATCH_TOKEN) {
            return Err(LookupError::NotSupported {
                model: model.to_string(),
            });
        }

        let url = self.lookup_url_for(model);
        let records: Vec<FirmwareRecord> =
            read_json(reader, &url)
                .await
                .map_err(|e| LookupError::LookupFailed {
                    model: model.to_string(),
                    reason: e.to_string(),
                })?;

        let record = records.first().ok_or_else(|| LookupError::LookupFailed {
            model: model.to_string(),
            reason: "lookup returned no firmware".to_string(),
        })?;

        self.asset_from_record(model, record)
    }

    /// Firmware assets for `models`, at most one per model
    ///
    /// Lookup failures are logged and produce no asset for that model.
    pub async fn assets_for<R>(&self, reader: &R, models: &[String]) -> Vec<Asset>
    where
        R: FeedReader + ?Sized,
    {
        let mut assets = Vec::new();
        for model in models {
            match self.lookup(reader, model).await {
                Ok(asset) => assets.push(asset),
                Err(LookupError::NotSupported { .. }) => {
                    debug!("No firmware source for {}", model);
                }
                Err(e) => warn!("{}", e),
            }
        }
        assets
    }

    /// Human-readable name of a device model
    ///
    /// Watch models have no lookup entry and are described generically.
    pub async fn device_description<R>(&self, reader: &R, model: &str) -> LookupResult<String>
    where
        R: FeedReader + ?Sized,
    {
        if model.contains(devices::WATCH_TOKEN) {
            return Ok("Apple Watch".to_string());
        }
        let url = self.name_url.replace("{model}", model);
        read_text(reader, &url)
            .await
            .map(|name| name.trim().to_string())
            .map_err(|e| LookupError::LookupFailed {
                model: model.to_string(),
                reason: e.to_string(),
            })
    }
}
