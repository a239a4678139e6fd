//! Prelude module for the precache library
//!
//! Re-exports the items needed to collect, select and cache assets with a
//! single `use precache::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use precache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = PrecacheClient::new()?;
//!     let server = CacheServer::parse("http://thor:49672")?;
//!     let aggregator = AssetAggregator::new(&client, AggregatorConfig::new(server, None));
//!
//!     let collection = aggregator.collect(CollectionPlan::default()).await?;
//!     println!("{} assets", collection.len());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Engine components
pub use crate::app::{
    AggregatorConfig, Asset, AssetAggregator, AssetCollection, CacheDriver, CacheServer,
    CacheTransport, ClientConfig, CollectionPlan, Criteria, DriverConfig, FeedReader,
    PrecacheClient, RunSummary,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{HTTP_TIMEOUT, USER_AGENT};

pub use std::path::{Path, PathBuf};

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client_config = ClientConfig::default();
        let _driver_config = DriverConfig::default();
        let criteria = Criteria::default();

        assert!(criteria.is_empty());
        assert_eq!(USER_AGENT, "precache");
        assert_eq!(CollectionPlan::default(), CollectionPlan::default());
    }
}
