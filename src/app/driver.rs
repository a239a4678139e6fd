//! Cache driver
//!
//! Walks the selected assets one URL at a time, decides whether each needs to
//! be requested through the caching server and reports a status line for it.
//! A single failing asset never stops the run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::app::models::Asset;
use crate::app::selection::{check_firmware, FirmwareCheck};
use crate::constants::throttle;
use crate::errors::DownloadResult;

/// Network side of caching: probes and downloads through the caching server
#[async_trait]
pub trait CacheTransport: Send + Sync {
    /// Whether the caching server already holds `url`; failures count as not cached
    async fn is_cached(&self, url: &str) -> bool;

    /// Request `url` through the caching server and discard the body
    async fn prime(&self, url: &str) -> DownloadResult<()>;

    /// Request `url` through the caching server and keep it at `destination`
    async fn download_to(&self, url: &str, destination: &Path) -> DownloadResult<()>;
}

/// Driver settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Directory firmware images are saved to
    pub destination: PathBuf,
    /// Report decisions without downloading anything
    pub dry_run: bool,
    /// Lower bound of the pause after each download
    pub throttle_min: Duration,
    /// Upper bound of the pause after each download
    pub throttle_max: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            destination: std::env::temp_dir(),
            dry_run: false,
            throttle_min: throttle::MIN_DELAY,
            throttle_max: throttle::MAX_DELAY,
        }
    }
}

/// Decision for one asset URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// The caching server already has it
    AlreadyCached,
    /// Request it
    Fetch,
    /// The local firmware image is stale, request it again
    Refetch,
    /// The local firmware image is current
    Skip,
}

impl CacheAction {
    /// Status label for this action
    pub fn label(self, dry_run: bool) -> &'static str {
        match (self, dry_run) {
            (CacheAction::AlreadyCached, _) => "Already cached",
            (CacheAction::Fetch, true) => "Cache",
            (CacheAction::Fetch, false) => "Caching",
            (CacheAction::Refetch, true) => "Re-download",
            (CacheAction::Refetch, false) => "Re-downloading",
            (CacheAction::Skip, true) => "Skip",
            (CacheAction::Skip, false) => "Skipping",
        }
    }

    /// Whether the action transfers data
    pub fn downloads(self) -> bool {
        matches!(self, CacheAction::Fetch | CacheAction::Refetch)
    }
}

/// Counts of what a run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Already held by the caching server
    pub already_cached: usize,
    /// Requested (or would be, in a dry run)
    pub fetched: usize,
    /// Stale firmware requested again
    pub refetched: usize,
    /// Current firmware left alone
    pub skipped: usize,
    /// Downloads that failed
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, action: CacheAction) {
        match action {
            CacheAction::AlreadyCached => self.already_cached += 1,
            CacheAction::Fetch => self.fetched += 1,
            CacheAction::Refetch => self.refetched += 1,
            CacheAction::Skip => self.skipped += 1,
        }
    }

    /// Total URLs processed
    pub fn total(&self) -> usize {
        self.already_cached + self.fetched + self.refetched + self.skipped + self.failed
    }
}

/// Drives caching of selected assets through a [`CacheTransport`]
pub struct CacheDriver<'a, T: CacheTransport + ?Sized> {
    transport: &'a T,
    config: DriverConfig,
}

impl<'a, T: CacheTransport + ?Sized> CacheDriver<'a, T> {
    /// Create a driver
    pub fn new(transport: &'a T, config: DriverConfig) -> Self {
        Self { transport, config }
    }

    /// Local path a firmware URL is saved to
    pub fn firmware_path(&self, url: &str) -> PathBuf {
        self.config.destination.join(Asset::output_filename(url))
    }

    async fn probe(&self, url: &str) -> CacheAction {
        if self.transport.is_cached(url).await {
            CacheAction::AlreadyCached
        } else {
            CacheAction::Fetch
        }
    }

    /// Decide what to do with one URL of `asset`
    ///
    /// `emit` receives the digest comparison notice for existing firmware.
    pub async fn decide(&self, asset: &Asset, url: &str, emit: &mut impl FnMut(String)) -> CacheAction {
        if !(asset.is_firmware() && Asset::is_firmware_url(url)) {
            return self.probe(url).await;
        }

        let path = self.firmware_path(url);
        if asset.sha_digest.is_some() && tokio::fs::metadata(&path).await.is_ok() {
            emit(format!(
                "A file already exists, comparing digest for {}",
                asset.caching_text(url)
            ));
        }

        match check_firmware(&path, asset).await {
            FirmwareCheck::Missing => CacheAction::Fetch,
            FirmwareCheck::Matches => CacheAction::Skip,
            FirmwareCheck::Differs => CacheAction::Refetch,
            FirmwareCheck::NoDigest => self.probe(url).await,
        }
    }

    async fn download(&self, asset: &Asset, url: &str) -> DownloadResult<()> {
        if asset.is_firmware() && Asset::is_firmware_url(url) {
            self.transport
                .download_to(url, &self.firmware_path(url))
                .await
        } else {
            self.transport.prime(url).await
        }
    }

    fn throttle_delay(&self) -> Duration {
        let min = self.config.throttle_min.as_millis() as u64;
        let max = (self.config.throttle_max.as_millis() as u64).max(min);
        Duration::from_millis(fastrand::u64(min..=max))
    }

    /// Process every URL of every asset, in order
    ///
    /// Status lines are passed to `emit`.
    pub async fn run(&self, assets: &[Asset], mut emit: impl FnMut(String)) -> RunSummary {
        let mut summary = RunSummary::default();

        for asset in assets {
            for url in &asset.urls {
                let text = asset.caching_text(url);
                let action = self.decide(asset, url, &mut emit).await;
                emit(format!("{}: {}", action.label(self.config.dry_run), text));

                if !action.downloads() || self.config.dry_run {
                    summary.record(action);
                    continue;
                }

                match self.download(asset, url).await {
                    Ok(()) => summary.record(action),
                    Err(e) => {
                        warn!("Download of {} failed: {}", url, e);
                        emit(format!("Failed: {} ({})", text, e));
                        summary.failed += 1;
                    }
                }

                let delay = self.throttle_delay();
                debug!("Pausing {:?} before the next request", delay);
                tokio::time::sleep(delay).await;
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::hash::Sha1Digest;
    use crate::errors::DownloadError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockTransport {
        cached: HashSet<String>,
        failing: HashSet<String>,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CacheTransport for MockTransport {
        async fn is_cached(&self, url: &str) -> bool {
            self.cached.contains(url)
        }

        async fn prime(&self, url: &str) -> DownloadResult<()> {
            self.requests.lock().unwrap().push(url.to_string());
            if self.failing.contains(url) {
                return Err(DownloadError::ServerError { status: 503 });
            }
            Ok(())
        }

        async fn download_to(&self, url: &str, destination: &Path) -> DownloadResult<()> {
            self.requests.lock().unwrap().push(url.to_string());
            tokio::fs::write(destination, b"firmware").await?;
            Ok(())
        }
    }

    fn config(destination: &Path, dry_run: bool) -> DriverConfig {
        DriverConfig {
            destination: destination.to_path_buf(),
            dry_run,
            throttle_min: Duration::ZERO,
            throttle_max: Duration::ZERO,
        }
    }

    fn app(url: &str) -> Asset {
        Asset {
            model: Some("MacBookPro14,3".to_string()),
            version: Some("5.3".to_string()),
            urls: vec![url.to_string()],
            group: "app".to_string(),
            product_title: Some("Server".to_string()),
            ..Default::default()
        }
    }

    fn firmware(digest: Option<Sha1Digest>) -> Asset {
        Asset {
            model: Some("iPad6,8".to_string()),
            model_description: Some("iPad Pro".to_string()),
            urls: vec!["http://thor:1/ios/iPad.ipsw?source=appldnld.apple.com".to_string()],
            group: "ipsw".to_string(),
            product_title: Some("iOS 10.3.2 build 14F89 (ipsw)".to_string()),
            sha_digest: digest,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cached_and_uncached_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = MockTransport::default();
        transport.cached.insert("http://thor:1/a.pkg".to_string());

        let driver = CacheDriver::new(&transport, config(dir.path(), false));
        let mut lines = Vec::new();
        let summary = driver
            .run(
                &[app("http://thor:1/a.pkg"), app("http://thor:1/b.pkg")],
                |line| lines.push(line),
            )
            .await;

        assert_eq!(lines[0], "Already cached: Server 5.3 (app)");
        assert_eq!(lines[1], "Caching: Server 5.3 (app)");
        assert_eq!(summary.already_cached, 1);
        assert_eq!(summary.fetched, 1);
        assert_eq!(*transport.requests.lock().unwrap(), vec!["http://thor:1/b.pkg"]);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_download() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::default();
        let driver = CacheDriver::new(&transport, config(dir.path(), true));

        let mut lines = Vec::new();
        let summary = driver
            .run(&[app("http://thor:1/a.pkg")], |line| lines.push(line))
            .await;

        assert_eq!(lines, vec!["Cache: Server 5.3 (app)"]);
        assert_eq!(summary.fetched, 1);
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = MockTransport::default();
        transport.failing.insert("http://thor:1/a.pkg".to_string());

        let driver = CacheDriver::new(&transport, config(dir.path(), false));
        let mut lines = Vec::new();
        let summary = driver
            .run(
                &[app("http://thor:1/a.pkg"), app("http://thor:1/b.pkg")],
                |line| lines.push(line),
            )
            .await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.fetched, 1);
        assert!(lines.iter().any(|l| l.starts_with("Failed: Server 5.3 (app)")));
        assert_eq!(transport.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_firmware_missing_is_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::default();
        let asset = firmware(Some(Sha1Digest::of_bytes(b"firmware")));

        let driver = CacheDriver::new(&transport, config(dir.path(), false));
        let mut lines = Vec::new();
        let summary = driver.run(&[asset], |line| lines.push(line)).await;

        assert_eq!(summary.fetched, 1);
        assert_eq!(
            lines,
            vec!["Caching: iPad6,8: iPad Pro - iOS 10.3.2 build 14F89 (ipsw)"]
        );
        assert!(dir.path().join("iPad.ipsw").exists());
    }

    #[tokio::test]
    async fn test_firmware_digest_match_skips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("iPad.ipsw"), b"firmware").unwrap();
        let transport = MockTransport::default();
        let asset = firmware(Some(Sha1Digest::of_bytes(b"firmware")));

        let driver = CacheDriver::new(&transport, config(dir.path(), false));
        let mut lines = Vec::new();
        let summary = driver.run(&[asset], |line| lines.push(line)).await;

        assert_eq!(summary.skipped, 1);
        assert!(lines[0].starts_with("A file already exists, comparing digest for iPad6,8"));
        assert!(lines[1].starts_with("Skipping: "));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_firmware_digest_mismatch_refetches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("iPad.ipsw"), b"truncated").unwrap();
        let transport = MockTransport::default();
        let asset = firmware(Some(Sha1Digest::of_bytes(b"firmware")));

        let driver = CacheDriver::new(&transport, config(dir.path(), true));
        let mut lines = Vec::new();
        let summary = driver.run(&[asset], |line| lines.push(line)).await;

        assert_eq!(summary.refetched, 1);
        assert!(lines[1].starts_with("Re-download: "));
    }

    #[tokio::test]
    async fn test_firmware_without_digest_probes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("iPad.ipsw"), b"firmware").unwrap();
        let asset = firmware(None);
        let mut transport = MockTransport::default();
        transport.cached.insert(asset.urls[0].clone());

        let driver = CacheDriver::new(&transport, config(dir.path(), false));
        let summary = driver.run(&[asset], |_| {}).await;
        assert_eq!(summary.already_cached, 1);
    }

    #[test]
    fn test_labels() {
        assert_eq!(CacheAction::Fetch.label(true), "Cache");
        assert_eq!(CacheAction::Refetch.label(false), "Re-downloading");
        assert_eq!(CacheAction::AlreadyCached.label(true), "Already cached");
        assert!(!CacheAction::Skip.downloads());
    }
}
