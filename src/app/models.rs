//! Data models for precache
//!
//! Every cacheable item, whatever feed it came from, is normalized into a
//! single [`Asset`] value. The asset's `group` decides which selection rule
//! and which status text applies to it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::hash::Sha1Digest;
use crate::app::proxy::display_filename;
use crate::constants::{files, groups};

/// A normalized cacheable item
///
/// Assets are built fresh for every run and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// Device model, or the host Mac's model for app and software updates
    pub model: Option<String>,
    /// Human-readable device name (firmware assets only)
    pub model_description: Option<String>,
    /// Product or OS version
    pub version: Option<String>,
    /// Caching-server formatted download URLs
    pub urls: Vec<String>,
    /// Coarse category: sucatalog, app, installer, ipsw or a device family
    pub group: String,
    /// Catalog product identifier (software updates only)
    pub product_id: Option<String>,
    /// Human-readable title
    pub product_title: Option<String>,
    /// Release or post date
    pub release_date: Option<DateTime<Utc>>,
    /// Expected digest of the firmware image
    pub sha_digest: Option<Sha1Digest>,
}

impl Asset {
    /// Whether this is a device firmware image
    pub fn is_firmware(&self) -> bool {
        self.group == groups::IPSW
    }

    /// Whether this is a software update catalog product
    pub fn is_software_update(&self) -> bool {
        self.group == groups::SUCATALOG
    }

    /// Model string used for matching, empty when unknown
    pub fn model_str(&self) -> &str {
        self.model.as_deref().unwrap_or("")
    }

    /// Title string used for matching, empty when unknown
    pub fn title_str(&self) -> &str {
        self.product_title.as_deref().unwrap_or("")
    }

    /// Product id string used for matching, empty when unknown
    pub fn product_id_str(&self) -> &str {
        self.product_id.as_deref().unwrap_or("")
    }

    /// Status text describing one of this asset's URLs
    ///
    /// # Examples
    ///
    /// ```rust
    /// use precache::app::Asset;
    ///
    /// let asset = Asset {
    ///     model: Some("iPad6,8".to_string()),
    ///     group: "iPad".to_string(),
    ///     product_title: Some("iOS 10.3.2 build 14F89".to_string()),
    ///     urls: vec!["http://thor:49672/a.zip?source=appldnld.apple.com".to_string()],
    ///     ..Default::default()
    /// };
    /// assert_eq!(asset.caching_text(&asset.urls[0]), "iPad6,8: iOS 10.3.2 build 14F89");
    /// ```
    pub fn caching_text(&self, url: &str) -> String {
        let title = text_or_unknown(&self.product_title);

        if self.group.contains(groups::APP) || self.group.contains(groups::INSTALLER) {
            format!(
                "{} {} ({})",
                title,
                text_or_unknown(&self.version),
                self.group
            )
        } else if self.group.contains(groups::SUCATALOG) {
            format!(
                "{}: {} - {}",
                text_or_unknown(&self.product_id),
                title,
                display_filename(url)
            )
        } else if let Some(description) = &self.model_description {
            format!("{}: {} - {}", text_or_unknown(&self.model), description, title)
        } else {
            format!("{}: {}", text_or_unknown(&self.model), title)
        }
    }

    /// Local file name a firmware URL is saved under
    pub fn output_filename(url: &str) -> String {
        display_filename(url)
    }

    /// Whether a URL points at a firmware image
    pub fn is_firmware_url(url: &str) -> bool {
        display_filename(url).ends_with(files::IPSW_EXTENSION)
    }
}

fn text_or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sucatalog_asset() -> Asset {
        Asset {
            model: Some("MacBookPro14,3".to_string()),
            version: Some("10.12.6".to_string()),
            urls: vec![
                "http://thor:49672/content/downloads/macOSUpd10.12.6.pkg?source=swcdn.apple.com"
                    .to_string(),
            ],
            group: groups::SUCATALOG.to_string(),
            product_id: Some("091-23456".to_string()),
            product_title: Some("macOS Sierra Update".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_caching_text_sucatalog() {
        let asset = sucatalog_asset();
        assert_eq!(
            asset.caching_text(&asset.urls[0]),
            "091-23456: macOS Sierra Update - macOSUpd10.12.6.pkg"
        );
        assert!(asset.is_software_update());
        assert!(!asset.is_firmware());
    }

    #[test]
    fn test_caching_text_app() {
        let asset = Asset {
            version: Some("5.3".to_string()),
            urls: vec!["http://thor:49672/a/Server.pkg?source=osxapps.itunes.apple.com".to_string()],
            group: groups::APP.to_string(),
            product_title: Some("Server".to_string()),
            ..Default::default()
        };
        assert_eq!(asset.caching_text(&asset.urls[0]), "Server 5.3 (app)");
    }

    #[test]
    fn test_caching_text_firmware_with_description() {
        let asset = Asset {
            model: Some("iPad6,8".to_string()),
            model_description: Some("iPad Pro (12.9-inch) (WiFi)".to_string()),
            group: groups::IPSW.to_string(),
            product_title: Some("iOS 10.3.2 build 14F89 (ipsw)".to_string()),
            ..Default::default()
        };
        assert_eq!(
            asset.caching_text("http://thor:1/x.ipsw?source=appldnld.apple.com"),
            "iPad6,8: iPad Pro (12.9-inch) (WiFi) - iOS 10.3.2 build 14F89 (ipsw)"
        );
        assert!(asset.is_firmware());
    }

    #[test]
    fn test_firmware_url_detection() {
        assert!(Asset::is_firmware_url(
            "http://thor:1/iPad_Restore.ipsw?source=appldnld.apple.com"
        ));
        assert!(!Asset::is_firmware_url(
            "http://thor:1/update.pkg?source=swcdn.apple.com"
        ));
        assert_eq!(
            Asset::output_filename("http://thor:1/iPad_Restore.ipsw?source=appldnld.apple.com"),
            "iPad_Restore.ipsw"
        );
    }

    #[test]
    fn test_element_wise_equality() {
        let a = sucatalog_asset();
        let mut b = sucatalog_asset();
        assert_eq!(a, b);
        b.version = Some("10.12.5".to_string());
        assert_ne!(a, b);
    }
}
