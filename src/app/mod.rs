//! Core asset discovery and caching engine
//!
//! Feeds are read through a [`FeedReader`], normalized into [`Asset`] values,
//! aggregated into one ordered collection, filtered by [`Criteria`] and
//! finally primed through the caching server by the [`CacheDriver`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use precache::app::{
//!     AggregatorConfig, AssetAggregator, CacheDriver, CacheServer, Criteria, DriverConfig,
//!     PrecacheClient,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PrecacheClient::new()?;
//! let server = CacheServer::parse("http://thor:49672")?;
//!
//! let mut criteria = Criteria::default();
//! criteria.models.insert("iPad6,8".to_string());
//!
//! let aggregator = AssetAggregator::new(&client, AggregatorConfig::new(server, None));
//! let collection = aggregator.collect(criteria.plan()).await?;
//! let selected = criteria.select(collection.into_assets());
//!
//! let driver = CacheDriver::new(&client, DriverConfig::default());
//! let summary = driver.run(&selected, |line| println!("{}", line)).await;
//! println!("{} fetched", summary.fetched);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod client;
pub mod driver;
pub mod feed;
pub mod hash;
pub mod locator;
pub mod models;
pub mod normalize;
pub mod proxy;
pub mod selection;

// Re-export main public API
pub use aggregate::{
    AggregatorConfig, AssetAggregator, AssetCollection, CollectionPlan, FeedLocations,
};
pub use client::{ClientConfig, PrecacheClient};
pub use driver::{CacheAction, CacheDriver, CacheTransport, DriverConfig, RunSummary};
pub use feed::{read_json, read_plist, FeedReader, StaticFeedReader};
pub use hash::Sha1Digest;
pub use locator::{host_model, locate_server, LocatorConfig};
pub use models::Asset;
pub use proxy::{display_filename, reformat_url, CacheServer};
pub use selection::{already_cached_digest_match, check_firmware, Criteria, FirmwareCheck};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent, "precache");
        assert!(Criteria::default().is_empty());
    }
}
