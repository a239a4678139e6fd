//! Downloads through the caching server
//!
//! Two kinds of download exist. Priming downloads stream the body and throw
//! it away: requesting the item through the caching server is all that is
//! needed to get it stored there. Firmware downloads are kept on disk and use
//! the temp file + rename pattern so an interrupted transfer never leaves a
//! truncated image behind under the final name.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::app::client::http::HttpHandler;
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// File download operations handler
pub struct DownloadHandler<'a> {
    http_handler: &'a HttpHandler,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler with the given HTTP handler
    pub fn new(http_handler: &'a HttpHandler) -> Self {
        Self { http_handler }
    }

    /// Requests `url` and discards the body
    ///
    /// Returns the number of bytes transferred.
    pub async fn prime(&self, url: &str) -> DownloadResult<u64> {
        let response = self.send(url).await?;

        let mut stream = response.bytes_stream();
        let mut transferred = 0u64;
        while let Some(chunk) = stream.next().await {
            transferred += chunk?.len() as u64;
        }

        tracing::debug!("Primed {} ({} bytes)", url, transferred);
        Ok(transferred)
    }

    /// Downloads `url` to `destination`, replacing any existing file
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The HTTP request fails or returns an error status
    /// - File I/O operations fail
    pub async fn download_file(&self, url: &str, destination: &Path) -> DownloadResult<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(destination);

        match self.download_to_temp(url, &temp_path).await {
            Ok(bytes) => {
                tokio::fs::rename(&temp_path, destination)
                    .await
                    .map_err(|_e| DownloadError::AtomicOperationFailed {
                        temp_path: temp_path.clone(),
                        final_path: destination.to_path_buf(),
                    })?;
                tracing::info!(
                    "Downloaded {} ({} bytes)",
                    destination.display(),
                    bytes
                );
                Ok(())
            }
            Err(e) => {
                if temp_path.exists() {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                }
                tracing::error!("Download of {} failed: {}", url, e);
                Err(e)
            }
        }
    }

    async fn download_to_temp(&self, url: &str, temp_path: &Path) -> DownloadResult<u64> {
        let response = self.send(url).await?;

        let mut file = File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn send(&self, url: &str) -> DownloadResult<reqwest::Response> {
        let parsed_url = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            error: e.to_string(),
        })?;

        let response = self
            .http_handler
            .client()
            .get(parsed_url.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::ServerError {
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

/// Temporary path used while `destination` is being written
fn temp_path_for(destination: &Path) -> PathBuf {
    destination.with_extension(format!(
        "{}{}",
        destination
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or(""),
        files::TEMP_FILE_SUFFIX
    ))
}
