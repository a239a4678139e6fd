//! Feed record normalization
//!
//! Each upstream source has its own adapter turning raw records into
//! [`Asset`](crate::app::Asset) values:
//!
//! - [`mobile`] - iOS, watchOS and tvOS software update feeds
//! - [`apps`] - the list of cacheable Mac apps and installers
//! - [`ipsw`] - the third-party firmware lookup service
//! - [`sucatalog`] - the macOS software update catalog
//!
//! Every field extraction rule is a standalone function taking the raw
//! record, so each rule can be tested on its own. An absent field falls back
//! to its documented default; a field with the wrong shape is reported as
//! [`FeedError::MalformedRecord`](crate::errors::FeedError::MalformedRecord)
//! and only the offending record is dropped.

pub mod apps;
pub mod ipsw;
pub mod mobile;
pub mod sucatalog;

pub use apps::AppAdapter;
pub use ipsw::FirmwareAdapter;
pub use mobile::MobileAdapter;
pub use sucatalog::SoftwareUpdateAdapter;

use crate::constants::devices;

/// OS name used in titles for a device model
///
/// Tested in priority order: iOS device tokens, then `Watch`, then `TV`.
pub fn title_prefix(model: &str) -> Option<&'static str> {
    if devices::IOS_DEVICES.iter().any(|device| model.contains(device)) {
        Some("iOS")
    } else if model.contains(devices::WATCH_TOKEN) {
        Some("watchOS")
    } else if model.contains(devices::TV_TOKEN) {
        Some("tvOS")
    } else {
        None
    }
}

/// Remove every ASCII digit from `text`
pub fn strip_digits(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_prefix() {
        assert_eq!(title_prefix("iPad6,8"), Some("iOS"));
        assert_eq!(title_prefix("iPhone9,1"), Some("iOS"));
        assert_eq!(title_prefix("Watch2,3"), Some("watchOS"));
        assert_eq!(title_prefix("AppleTV5,3"), Some("tvOS"));
        assert_eq!(title_prefix("MacBookPro14,3"), None);
    }

    #[test]
    fn test_strip_digits() {
        assert_eq!(strip_digits("Safari10.1ElCapitan"), "Safari.ElCapitan");
        assert_eq!(strip_digits("123"), "");
    }
}
