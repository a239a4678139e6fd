//! Selection of assets to cache
//!
//! Criteria come in five categories. An asset is selected when it matches any
//! non-empty category, and every comparison is substring containment so that
//! partial keywords such as `iPad6` or `Sierra` work.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::app::aggregate::CollectionPlan;
use crate::app::hash::Sha1Digest;
use crate::app::models::Asset;
use crate::constants::{devices, groups};
use crate::errors::{SelectionError, SelectionResult};

/// What to select from the collected assets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    /// Device models (matched against non-firmware assets)
    pub models: BTreeSet<String>,
    /// Asset groups
    pub groups: BTreeSet<String>,
    /// App or installer names
    pub apps: BTreeSet<String>,
    /// Software update product ids or title keywords
    pub mac_updates: BTreeSet<String>,
    /// Device models to fetch firmware images for
    pub firmware_models: BTreeSet<String>,
}

fn any_contained(needles: &BTreeSet<String>, haystack: &str) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

impl Criteria {
    /// Whether no category was supplied
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
            && self.groups.is_empty()
            && self.apps.is_empty()
            && self.mac_updates.is_empty()
            && self.firmware_models.is_empty()
    }

    /// Fail when nothing at all was requested
    pub fn ensure_not_empty(&self) -> SelectionResult<()> {
        if self.is_empty() {
            Err(SelectionError::NoCriteria)
        } else {
            Ok(())
        }
    }

    /// Fill each empty category from `defaults`
    pub fn merge_defaults(&mut self, defaults: &Criteria) {
        fn fill(target: &mut BTreeSet<String>, source: &BTreeSet<String>) {
            if target.is_empty() {
                target.extend(source.iter().cloned());
            }
        }

        fill(&mut self.models, &defaults.models);
        fill(&mut self.groups, &defaults.groups);
        fill(&mut self.apps, &defaults.apps);
        fill(&mut self.mac_updates, &defaults.mac_updates);
        fill(&mut self.firmware_models, &defaults.firmware_models);
    }

    /// Whether the software update catalog has to be read
    pub fn wants_software_updates(&self) -> bool {
        self.groups.contains(groups::SUCATALOG) || !self.mac_updates.is_empty()
    }

    /// Whether the app list has to be read
    pub fn wants_apps(&self) -> bool {
        !self.apps.is_empty()
            || devices::ASSET_GROUPS
                .iter()
                .any(|group| self.groups.contains(*group))
    }

    /// Optional sources needed to satisfy these criteria
    pub fn plan(&self) -> CollectionPlan {
        CollectionPlan {
            software_updates: self.wants_software_updates(),
            apps: self.wants_apps(),
        }
    }

    /// Resolve requested firmware models against the capable list
    ///
    /// Requests without any digit are wildcards matched against every capable
    /// model; otherwise each request must name a capable model exactly and
    /// unknown ones are returned as `InvalidSelection` alongside the valid
    /// models.
    pub fn resolve_firmware_models(
        &self,
        capable: &[String],
    ) -> (Vec<String>, Vec<SelectionError>) {
        if self.firmware_models.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let has_digits = self
            .firmware_models
            .iter()
            .any(|model| model.chars().any(|c| c.is_ascii_digit()));

        if !has_digits {
            let models = capable
                .iter()
                .filter(|model| any_contained(&self.firmware_models, model))
                .cloned()
                .collect();
            return (models, Vec::new());
        }

        let mut models = Vec::new();
        let mut rejected = Vec::new();
        for requested in &self.firmware_models {
            if capable.contains(requested) {
                models.push(requested.clone());
            } else {
                rejected.push(SelectionError::InvalidSelection {
                    model: requested.clone(),
                    known: capable.to_vec(),
                });
            }
        }
        (models, rejected)
    }

    /// Non-firmware asset for a requested model
    pub fn matches_model(&self, asset: &Asset) -> bool {
        !asset.is_firmware() && any_contained(&self.models, asset.model_str())
    }

    /// Firmware image for a requested model
    pub fn matches_firmware(&self, asset: &Asset) -> bool {
        asset.is_firmware() && any_contained(&self.firmware_models, asset.model_str())
    }

    /// Asset in a requested group
    pub fn matches_group(&self, asset: &Asset) -> bool {
        any_contained(&self.groups, &asset.group)
    }

    /// Software update with a requested product id or title keyword
    pub fn matches_mac_update(&self, asset: &Asset) -> bool {
        asset.is_software_update()
            && (any_contained(&self.mac_updates, asset.product_id_str())
                || any_contained(&self.mac_updates, asset.title_str()))
    }

    /// Asset whose title names a requested app
    pub fn matches_app(&self, asset: &Asset) -> bool {
        any_contained(&self.apps, asset.title_str())
    }

    /// Whether any category selects `asset`
    pub fn matches(&self, asset: &Asset) -> bool {
        self.matches_model(asset)
            || self.matches_firmware(asset)
            || self.matches_group(asset)
            || self.matches_mac_update(asset)
            || self.matches_app(asset)
    }

    /// Selected assets in collection order, each at most once
    pub fn select(&self, assets: Vec<Asset>) -> Vec<Asset> {
        let selected: Vec<Asset> = assets.into_iter().filter(|a| self.matches(a)).collect();
        debug!("Selected {} assets", selected.len());
        selected
    }
}

/// State of a previously downloaded firmware image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareCheck {
    /// No local file
    Missing,
    /// Local file matches the published digest
    Matches,
    /// Local file differs from the published digest, or could not be read
    Differs,
    /// A local file exists but the asset has no digest to compare
    NoDigest,
}

/// Whether a local file digest matches the asset's published digest
pub fn already_cached_digest_match(local: &Sha1Digest, asset: &Asset) -> bool {
    asset.sha_digest.as_ref() == Some(local)
}

/// Compare the firmware image at `path` against `asset`
pub async fn check_firmware(path: &Path, asset: &Asset) -> FirmwareCheck {
    if tokio::fs::metadata(path).await.is_err() {
        return FirmwareCheck::Missing;
    }
    if asset.sha_digest.is_none() {
        return FirmwareCheck::NoDigest;
    }

    match Sha1Digest::of_file(path).await {
        Ok(local) if already_cached_digest_match(&local, asset) => FirmwareCheck::Matches,
        Ok(_) => FirmwareCheck::Differs,
        Err(e) => {
            warn!("Could not digest {}: {}", path.display(), e);
            FirmwareCheck::Differs
        }
    }
}
