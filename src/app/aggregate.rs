//! Asset aggregation across all feeds
//!
//! The aggregator owns the ordered asset collection for one run. Mobile OS
//! updates are always collected; software updates and apps only when the
//! [`CollectionPlan`] asks for them, and firmware only for the models that
//! survived validation against the capable-model list.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::app::feed::{read_plist, FeedReader};
use crate::app::models::Asset;
use crate::app::normalize::mobile::feed_records;
use crate::app::normalize::sucatalog::default_min_post_date;
use crate::app::normalize::{AppAdapter, FirmwareAdapter, MobileAdapter, SoftwareUpdateAdapter};
use crate::app::proxy::CacheServer;
use crate::constants::{catalog, devices, feeds};
use crate::errors::{FeedResult, LookupResult};

/// Upstream document locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLocations {
    /// iOS, watchOS and tvOS update feeds
    pub mobile_feeds: Vec<String>,
    /// Software update catalog
    pub sucatalog_url: String,
    /// Cacheable apps and installers list
    pub apps_list_url: String,
    /// Firmware lookup template (`{model}`)
    pub ipsw_lookup_url: String,
    /// Device description template (`{model}`)
    pub ipsw_name_url: String,
}

impl Default for FeedLocations {
    fn default() -> Self {
        Self {
            mobile_feeds: [feeds::IOS_FEED, feeds::WATCH_FEED, feeds::TV_FEED]
                .iter()
                .map(|feed| format!("{}{}", feeds::IOS_BASE_URL, feed))
                .collect(),
            sucatalog_url: format!("{}{}", feeds::SUCATALOG_BASE_URL, feeds::SUCATALOG_PATH),
            apps_list_url: feeds::APPS_LIST_URL.to_string(),
            ipsw_lookup_url: feeds::IPSW_LOOKUP_URL.to_string(),
            ipsw_name_url: feeds::IPSW_NAME_URL.to_string(),
        }
    }
}

/// Everything the aggregator needs for one run
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Caching server URLs are rewritten for
    pub server: CacheServer,
    /// Hardware model of this Mac, recorded on app and catalog assets
    pub host_model: Option<String>,
    /// Feed locations
    pub feeds: FeedLocations,
    /// Catalog title exclusion substrings
    pub excludes: Vec<String>,
    /// Catalog post date cutoff
    pub min_post_date: NaiveDate,
}

impl AggregatorConfig {
    /// Configuration with default feeds, excludes and cutoff
    pub fn new(server: CacheServer, host_model: Option<String>) -> Self {
        Self {
            server,
            host_model,
            feeds: FeedLocations::default(),
            excludes: catalog::DEFAULT_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_post_date: default_min_post_date(),
        }
    }
}

/// Which optional sources to collect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionPlan {
    /// Read the software update catalog
    pub software_updates: bool,
    /// Read the app list
    pub apps: bool,
}

/// Ordered, duplicate-free asset collection for one run
#[derive(Debug, Clone, Default)]
pub struct AssetCollection {
    assets: Vec<Asset>,
    firmware_capable: Vec<String>,
}

impl AssetCollection {
    /// Build a collection, stable-sorted by model
    pub fn new(mut assets: Vec<Asset>, firmware_capable: Vec<String>) -> Self {
        assets.sort_by(|a, b| a.model.cmp(&b.model));
        Self {
            assets,
            firmware_capable,
        }
    }

    /// Append an asset unless an identical one is already present
    pub fn push_unique(&mut self, asset: Asset) -> bool {
        if self.assets.contains(&asset) {
            debug!("Dropping duplicate asset {}", asset.title_str());
            return false;
        }
        self.assets.push(asset);
        true
    }

    /// Collected assets in order
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Hand the assets off to selection
    pub fn into_assets(self) -> Vec<Asset> {
        self.assets
    }

    /// Sorted distinct models seen in the mobile feeds that have firmware images
    pub fn firmware_capable(&self) -> &[String] {
        &self.firmware_capable
    }

    /// Number of collected assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Sorted distinct firmware-capable models of a mobile batch
pub fn firmware_capable_models(mobile: &[Asset]) -> Vec<String> {
    let mut models: Vec<String> = mobile
        .iter()
        .filter_map(|asset| asset.model.as_deref())
        .filter(|model| devices::IPSW_CAPABLE.iter().any(|family| model.contains(family)))
        .map(str::to_string)
        .collect();
    models.sort();
    models.dedup();
    models
}

/// Collects assets from every feed through a [`FeedReader`]
pub struct AssetAggregator<'a, R: FeedReader + ?Sized> {
    reader: &'a R,
    config: AggregatorConfig,
}

impl<'a, R: FeedReader + ?Sized> AssetAggregator<'a, R> {
    /// Create an aggregator reading through `reader`
    pub fn new(reader: &'a R, config: AggregatorConfig) -> Self {
        Self { reader, config }
    }

    /// Aggregator configuration
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// iOS, watchOS and tvOS update assets
    ///
    /// # Errors
    ///
    /// Any unreadable mobile feed is fatal
    pub async fn mobile_assets(&self) -> FeedResult<Vec<Asset>> {
        let adapter = MobileAdapter::new(self.config.server.clone());
        let mut assets = Vec::new();

        for url in &self.config.feeds.mobile_feeds {
            let records = feed_records(read_plist(self.reader, url).await?)?;
            let before = assets.len();
            assets.extend(adapter.normalize(records));
            debug!("{} mobile assets from {}", assets.len() - before, url);
        }

        Ok(assets)
    }

    /// App and installer assets; an unreadable list yields none
    pub async fn app_assets(&self) -> Vec<Asset> {
        let adapter = AppAdapter::new(self.config.server.clone(), self.config.host_model.clone());
        let url = &self.config.feeds.apps_list_url;

        let list = match read_plist(self.reader, url).await {
            Ok(list) => list,
            Err(e) => {
                warn!("App list unavailable, continuing without apps: {}", e);
                return Vec::new();
            }
        };

        let assets = match adapter.normalize(list) {
            Ok(assets) => assets.collect(),
            Err(e) => {
                warn!("Ignoring app list {}: {}", url, e);
                Vec::new()
            }
        };
        assets
    }

    /// Software update catalog assets, newest first
    ///
    /// # Errors
    ///
    /// An unreadable catalog is fatal
    pub async fn software_update_assets(&self) -> FeedResult<Vec<Asset>> {
        SoftwareUpdateAdapter::new(self.config.server.clone(), self.config.host_model.clone())
            .with_excludes(self.config.excludes.clone())
            .with_min_post_date(self.config.min_post_date)
            .collect(self.reader, &self.config.feeds.sucatalog_url)
            .await
    }

    /// Collect every source the plan asks for
    pub async fn collect(&self, plan: CollectionPlan) -> FeedResult<AssetCollection> {
        info!("Reading mobile update feeds");
        let mut assets = self.mobile_assets().await?;
        let firmware_capable = firmware_capable_models(&assets);

        if plan.software_updates {
            info!("Reading software update catalog");
            assets.extend(self.software_update_assets().await?);
        }

        if plan.apps {
            info!("Reading app list");
            assets.extend(self.app_assets().await);
        }

        let collection = AssetCollection::new(assets, firmware_capable);
        info!("Collected {} assets", collection.len());
        Ok(collection)
    }

    fn firmware_adapter(&self) -> FirmwareAdapter {
        FirmwareAdapter::new(
            self.config.server.clone(),
            &self.config.feeds.ipsw_lookup_url,
            &self.config.feeds.ipsw_name_url,
        )
    }

    /// Look up firmware for `models` and append new assets to `collection`
    ///
    /// Returns how many assets were added.
    pub async fn add_firmware(&self, collection: &mut AssetCollection, models: &[String]) -> usize {
        if models.is_empty() {
            return 0;
        }

        info!("Looking up firmware for {} models", models.len());
        let mut added = 0;
        for asset in self.firmware_adapter().assets_for(self.reader, models).await {
            if collection.push_unique(asset) {
                added += 1;
            }
        }
        added
    }

    /// Human-readable description of a device model
    pub async fn describe_model(&self, model: &str) -> LookupResult<String> {
        self.firmware_adapter()
            .device_description(self.reader, model)
            .await
    }
}
