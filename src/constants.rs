//! Application constants for precache
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "precache";

    /// Default HTTP request timeout for feeds, metadata and lookups
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default rate limit for feed and metadata reads (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;

    /// Response header whose absence signals that the caching server already holds the item
    pub const CACHE_SIGNAL_HEADER: &str = "content-type";
}

/// Upstream feed locations
pub mod feeds {
    /// Base URL for the mobile asset (iOS/watchOS/tvOS) feeds
    pub const IOS_BASE_URL: &str = "http://mesu.apple.com/assets/";

    /// iOS software update feed, relative to [`IOS_BASE_URL`]
    pub const IOS_FEED: &str =
        "com_apple_MobileAsset_SoftwareUpdate/com_apple_MobileAsset_SoftwareUpdate.xml";

    /// watchOS software update feed, relative to [`IOS_BASE_URL`]
    pub const WATCH_FEED: &str =
        "watch/com_apple_MobileAsset_SoftwareUpdate/com_apple_MobileAsset_SoftwareUpdate.xml";

    /// tvOS software update feed, relative to [`IOS_BASE_URL`]
    pub const TV_FEED: &str =
        "tv/com_apple_MobileAsset_SoftwareUpdate/com_apple_MobileAsset_SoftwareUpdate.xml";

    /// Base URL for the software update catalog
    pub const SUCATALOG_BASE_URL: &str = "https://swscan.apple.com/";

    /// Merged software update catalog, relative to [`SUCATALOG_BASE_URL`]
    pub const SUCATALOG_PATH: &str = "content/catalogs/others/index-10.12-10.11-10.10-10.9-mountainlion-lion-snowleopard-leopard.merged-1.sucatalog";

    /// Remote list of cacheable apps and installers
    pub const APPS_LIST_URL: &str = "https://raw.githubusercontent.com/krypted/precache/master/com.github.krypted.precache.apps-list.plist";

    /// Firmware lookup endpoint, `{model}` is replaced with the device model
    pub const IPSW_LOOKUP_URL: &str = "https://api.ipsw.me/v2.1/{model}/latest/info.json";

    /// Device description endpoint, `{model}` is replaced with the device model
    pub const IPSW_NAME_URL: &str = "https://api.ipsw.me/v2.1/{model}/latest/name";
}

/// Software update catalog processing
pub mod catalog {
    /// Products posted before this date (El Capitan release) are ignored
    pub const MIN_POST_DATE: &str = "2015-09-30";

    /// Package file extension collected from catalog products
    pub const PACKAGE_EXTENSION: &str = ".pkg";

    /// Title token that triggers release-family disambiguation
    pub const SAFARI_TOKEN: &str = "Safari";

    /// Bundle version key in product metadata
    pub const VERSION_KEY: &str = "CFBundleShortVersionString";

    /// Default exclusion substrings for catalog product titles
    pub const DEFAULT_EXCLUDES: &[&str] = &[
        "Voice Update",
        "Mountain Lion",
        "Lion",
        "Snow Leopard",
        "Leopard",
        "Tiger",
        "Panther",
        "Jaguar",
        "Puma",
        "Cheetah",
        "Kodiak",
        "Printer",
        "Java",
        "Flash",
        "Logic Pro",
        "GarageBand",
        "Pages",
        "Keynote",
        "Numbers",
        "Speech",
        "iPhone",
        "Dictation",
        "MainStage",
        "QuickTime",
        "Final Cut Pro",
        "FontAssets",
        "Bluetooth",
        "Photo Content",
        "VoiceOver",
        "Motion",
        "MRTConfig",
        "Mac OS X Server",
        "Chinese",
        "Driver",
        "Developer",
        "Preview",
        "Beta",
        "iAd",
        "Kernel",
        "10.9",
        "10.8",
        "10.7",
        "10.6",
        "10.5",
        "10.4",
        "10.3",
        "10.2",
        "10.1",
        "10.0",
        "iPhoto",
        "Rosetta",
        "SafeView",
        "NRT",
        "AppleDisplays",
        "Apple Directory",
        "AppleConnect",
        "App Store",
        "BlueTooth",
        "GateKeeper",
        "Noticeboard",
        "CoreSuggestions",
        "Pro Video",
        "Beats",
        "XProtect",
        "Installer Notification",
        "Technology Preview",
        "Remote Desktop",
        "System Integrity",
        "BootCamp",
        "Configuration Data",
        "iTunes Producer",
        "RAW",
    ];
}

/// Device families and asset groups
pub mod devices {
    /// Model tokens identifying iOS devices
    pub const IOS_DEVICES: &[&str] = &["iPad", "iPhone", "iPod"];

    /// Model families that have firmware images available
    pub const IPSW_CAPABLE: &[&str] = &["AppleTV", "iPad", "iPhone", "iPod"];

    /// Token identifying watch models, which have no firmware source
    pub const WATCH_TOKEN: &str = "Watch";

    /// Token identifying TV models
    pub const TV_TOKEN: &str = "TV";

    /// Broken version prefix observed in some mobile feed records
    pub const BOGUS_VERSION_PREFIX: &str = "9.9.";

    /// Placeholder build text when a record carries no build
    pub const NO_BUILD: &str = "No build found";

    /// Groups recognised for app/installer collection
    pub const ASSET_GROUPS: &[&str] = &[
        "AppleTV",
        "iPad",
        "iPhone",
        "iPod",
        "app",
        "installer",
        "sucatalog",
    ];
}

/// Group names assigned by the normalizer
pub mod groups {
    /// Software update catalog products
    pub const SUCATALOG: &str = "sucatalog";

    /// Mac App Store apps
    pub const APP: &str = "app";

    /// macOS installers
    pub const INSTALLER: &str = "installer";

    /// Device firmware images
    pub const IPSW: &str = "ipsw";
}

/// Download throttling between individual fetches
pub mod throttle {
    use super::Duration;

    /// Lower bound of the randomized post-download delay
    pub const MIN_DELAY: Duration = Duration::from_secs(1);

    /// Upper bound of the randomized post-download delay
    pub const MAX_DELAY: Duration = Duration::from_secs(2);
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Firmware image extension
    pub const IPSW_EXTENSION: &str = ".ipsw";

    /// Read buffer size for digest computation (64KB)
    pub const DIGEST_BLOCK_SIZE: usize = 64 * 1024;
}

/// Caching server discovery
pub mod locator {
    /// Tethered caching configuration plist
    pub const TETHERATOR_PLIST: &str = "/Library/Preferences/com.apple.AssetCache.plist";

    /// Server.app caching service configuration plist
    pub const CACHE_SERVER_PLIST: &str = "/Library/Server/Caching/Config/Config.plist";

    /// Platform utility that reports reachable caching servers
    pub const LOCATOR_COMMAND: &str = "/usr/bin/AssetCacheLocatorUtil";

    /// Address prefixes accepted from the locator output
    pub const LOCAL_ADDRESS_PREFIXES: &[&str] =
        &["localhost", "127.", "10.", "172.16", "192.168."];
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

// Re-export commonly used constants for convenience
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
