//! macOS software update catalog
//!
//! The catalog's `Products` dictionary maps product ids to package lists and
//! a `ServerMetadataURL` pointing at per-product metadata (title, version).
//! Metadata reads are best-effort; the catalog itself is not.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::strip_digits;
use crate::app::feed::{read_plist, FeedReader};
use crate::app::models::Asset;
use crate::app::proxy::{display_filename, CacheServer};
use crate::constants::{catalog, groups};
use crate::errors::{FeedError, FeedResult};

/// One product entry of the catalog
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogProduct {
    /// Per-product metadata document
    #[serde(rename = "ServerMetadataURL")]
    pub server_metadata_url: Option<String>,
    /// Installer packages of the product
    #[serde(rename = "Packages", default)]
    pub packages: Vec<CatalogPackage>,
    /// Date the product was posted to the catalog
    #[serde(rename = "PostDate")]
    pub post_date: Option<plist::Date>,
}

/// One package of a catalog product
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPackage {
    /// Origin download URL
    #[serde(rename = "URL")]
    pub url: String,
}

/// Default cutoff for catalog post dates
pub fn default_min_post_date() -> NaiveDate {
    catalog::MIN_POST_DATE.parse().unwrap_or_default()
}

/// English title from product metadata
///
/// The first localization whose key starts with `English` or `en` wins; its
/// `title` may still be absent.
pub fn metadata_title(metadata: &plist::Value) -> Option<String> {
    let localizations = metadata
        .as_dictionary()?
        .get("localization")?
        .as_dictionary()?;

    let (_, english) = localizations
        .iter()
        .find(|(key, _)| key.starts_with("English") || key.starts_with("en"))?;

    english
        .as_dictionary()?
        .get("title")?
        .as_string()
        .map(str::to_string)
}

/// Bundle version from product metadata
pub fn metadata_version(metadata: &plist::Value) -> Option<String> {
    metadata
        .as_dictionary()?
        .get(catalog::VERSION_KEY)?
        .as_string()
        .map(str::to_string)
}

/// Split a camel-case token into words
///
/// A space is inserted before each uppercase character that starts a new
/// uppercase run, except at the start of the token.
///
/// ```rust
/// use precache::app::normalize::sucatalog::split_camel_case;
///
/// assert_eq!(split_camel_case("ElCapitan"), "El Capitan");
/// assert_eq!(split_camel_case("macOS"), "mac OS");
/// assert_eq!(split_camel_case("Sierra"), "Sierra");
/// ```
pub fn split_camel_case(text: &str) -> String {
    let mut split = String::with_capacity(text.len() + 4);
    let mut previous: Option<char> = None;

    for c in text.chars() {
        if c.is_uppercase() && previous.is_some_and(|p| !p.is_uppercase()) {
            split.push(' ');
        }
        split.push(c);
        previous = Some(c);
    }

    split
}

/// Release family encoded in a Safari package file name
///
/// `Safari10.1ElCapitan.pkg` yields `ElCapitan`.
pub fn safari_release_family(url: &str) -> String {
    let name = display_filename(url)
        .replace(catalog::PACKAGE_EXTENSION, "")
        .replace(catalog::SAFARI_TOKEN, "")
        .replace('.', "");
    strip_digits(&name)
}

/// Whether a title matches any exclusion substring
///
/// A missing title never matches.
pub fn is_excluded(title: Option<&str>, excludes: &[String]) -> bool {
    match title {
        Some(title) => excludes.iter().any(|item| title.contains(item.as_str())),
        None => false,
    }
}

/// Title with the Safari release family appended, when one can be derived
pub fn disambiguate_title(title: &str, urls: &[String]) -> String {
    if !title.contains(catalog::SAFARI_TOKEN) {
        return title.to_string();
    }

    urls.iter()
        .map(|url| safari_release_family(url))
        .find(|family| !family.is_empty())
        .map(|family| format!("{} {}", title, split_camel_case(&family)))
        .unwrap_or_else(|| title.to_string())
}

/// Adapter from catalog products to software update assets
#[derive(Debug, Clone)]
pub struct SoftwareUpdateAdapter {
    server: CacheServer,
    host_model: Option<String>,
    excludes: Vec<String>,
    min_post_date: NaiveDate,
}

impl SoftwareUpdateAdapter {
    /// Create an adapter with the default exclusion list and cutoff date
    pub fn new(server: CacheServer, host_model: Option<String>) -> Self {
        Self {
            server,
            host_model,
            excludes: catalog::DEFAULT_EXCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_post_date: default_min_post_date(),
        }
    }

    /// Replace the exclusion substrings
    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes;
        self
    }

    /// Replace the post date cutoff
    pub fn with_min_post_date(mut self, min_post_date: NaiveDate) -> Self {
        self.min_post_date = min_post_date;
        self
    }

    /// Post date of a product if it is recent enough to keep
    fn accepted_post_date(&self, product: &CatalogProduct) -> Option<DateTime<Utc>> {
        let posted: DateTime<Utc> = std::time::SystemTime::from(product.post_date?).into();
        (posted.date_naive() >= self.min_post_date).then_some(posted)
    }

    /// Build the asset for one product from its (optional) metadata
    ///
    /// Returns `Ok(None)` when the product is excluded, too old, or ships no
    /// packages.
    pub fn build_asset(
        &self,
        product_id: &str,
        product: &CatalogProduct,
        metadata: Option<&plist::Value>,
    ) -> FeedResult<Option<Asset>> {
        let Some(release_date) = self.accepted_post_date(product) else {
            debug!("Skipping {}: posted before cutoff or undated", product_id);
            return Ok(None);
        };

        let urls = product
            .packages
            .iter()
            .filter(|pkg| pkg.url.ends_with(catalog::PACKAGE_EXTENSION))
            .map(|pkg| self.server.reformat(&pkg.url))
            .collect::<FeedResult<Vec<_>>>()?;
        if urls.is_empty() {
            debug!("Skipping {}: no packages", product_id);
            return Ok(None);
        }

        let title = metadata.and_then(metadata_title);
        if is_excluded(title.as_deref(), &self.excludes) {
            debug!("Excluding {} ({:?})", product_id, title);
            return Ok(None);
        }
        let title = title.map(|t| disambiguate_title(&t, &urls));

        Ok(Some(Asset {
            model: self.host_model.clone(),
            version: metadata.and_then(metadata_version),
            urls,
            group: groups::SUCATALOG.to_string(),
            product_id: Some(product_id.to_string()),
            product_title: title,
            release_date: Some(release_date),
            ..Default::default()
        }))
    }

    /// Read the catalog and every product's metadata
    ///
    /// Assets are unique by product id and sorted newest first.
    ///
    /// # Errors
    ///
    /// Returns `FeedError` if the catalog itself cannot be read or has no
    /// `Products` dictionary
    pub async fn collect<R>(&self, reader: &R, catalog_url: &str) -> FeedResult<Vec<Asset>>
    where
        R: FeedReader + ?Sized,
    {
        let catalog = read_plist(reader, catalog_url).await?;
        let products = catalog
            .as_dictionary()
            .and_then(|d| d.get("Products"))
            .and_then(plist::Value::as_dictionary)
            .ok_or_else(|| FeedError::MalformedRecord {
                field: "Products".to_string(),
                reason: format!("catalog {} has no product dictionary", catalog_url),
            })?;

        info!("Reading {} catalog products", products.len());

        let mut seen = HashSet::new();
        let mut assets = Vec::new();

        for (product_id, raw) in products {
            if seen.contains(product_id.as_str()) {
                continue;
            }

            let product: CatalogProduct = match plist::from_value(raw) {
                Ok(product) => product,
                Err(e) => {
                    warn!("Skipping malformed catalog product {}: {}", product_id, e);
                    continue;
                }
            };

            // Undated and stale products never need their metadata
            if self.accepted_post_date(&product).is_none() {
                continue;
            }

            let metadata = match product.server_metadata_url.as_deref() {
                Some(url) => match read_plist(reader, url).await {
                    Ok(metadata) => Some(metadata),
                    Err(e) => {
                        debug!("No metadata for {}: {}", product_id, e);
                        None
                    }
                },
                None => None,
            };

            match self.build_asset(product_id, &product, metadata.as_ref()) {
                Ok(Some(asset)) => {
                    seen.insert(product_id.clone());
                    assets.push(asset);
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping catalog product {}: {}", product_id, e),
            }
        }

        assets.sort_by(|a, b| b.release_date.cmp(&a.release_date));
        Ok(assets)
    }
}
