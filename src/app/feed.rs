//! Remote feed documents
//!
//! A [`FeedReader`] turns a URL into raw bytes; the helpers in this module
//! parse those bytes into a property-list tree or a typed JSON value. Reads
//! are never retried: a failed read is reported once as
//! [`FeedError::FeedUnavailable`] and the caller decides whether that source
//! is optional.

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{FeedError, FeedResult};

/// Source of raw feed documents
#[async_trait]
pub trait FeedReader: Send + Sync {
    /// Fetch the document at `url`
    async fn fetch(&self, url: &str) -> FeedResult<Vec<u8>>;
}

impl FeedError {
    /// Wrap any failure reading `url` as an unavailable feed
    pub fn unavailable(url: &str, reason: impl fmt::Display) -> Self {
        FeedError::FeedUnavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Fetch and parse a property-list document (XML or binary)
pub async fn read_plist<R>(reader: &R, url: &str) -> FeedResult<plist::Value>
where
    R: FeedReader + ?Sized,
{
    let bytes = reader
        .fetch(url)
        .await
        .map_err(|e| FeedError::unavailable(url, e))?;
    let value = plist::Value::from_reader(Cursor::new(bytes))
        .map_err(|e| FeedError::unavailable(url, format!("not a property list: {e}")))?;
    debug!("Parsed property list from {}", url);
    Ok(value)
}

/// Fetch and parse a JSON document into `T`
pub async fn read_json<R, T>(reader: &R, url: &str) -> FeedResult<T>
where
    R: FeedReader + ?Sized,
    T: DeserializeOwned,
{
    let bytes = reader
        .fetch(url)
        .await
        .map_err(|e| FeedError::unavailable(url, e))?;
    let value = serde_json::from_slice(&bytes)
        .map_err(|e| FeedError::unavailable(url, format!("not valid JSON: {e}")))?;
    debug!("Parsed JSON document from {}", url);
    Ok(value)
}

/// Fetch a plain text document
pub async fn read_text<R>(reader: &R, url: &str) -> FeedResult<String>
where
    R: FeedReader + ?Sized,
{
    let bytes = reader
        .fetch(url)
        .await
        .map_err(|e| FeedError::unavailable(url, e))?;
    String::from_utf8(bytes).map_err(|e| FeedError::unavailable(url, e))
}

/// In-memory feed reader serving fixed documents by URL
///
/// Used for offline runs against saved feeds and for tests.
#[derive(Debug, Default, Clone)]
pub struct StaticFeedReader {
    documents: HashMap<String, Vec<u8>>,
}

impl StaticFeedReader {
    /// Create an empty reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve raw bytes at `url`
    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.documents.insert(url.into(), bytes.into());
        self
    }

    /// Serve a property list (as XML) at `url`
    pub fn insert_plist(&mut self, url: impl Into<String>, value: &plist::Value) -> &mut Self {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail for well-formed values
        if value.to_writer_xml(&mut buffer).is_ok() {
            self.documents.insert(url.into(), buffer);
        }
        self
    }

    /// Serve a JSON value at `url`
    pub fn insert_json(&mut self, url: impl Into<String>, value: &serde_json::Value) -> &mut Self {
        self.documents
            .insert(url.into(), value.to_string().into_bytes());
        self
    }
}

#[async_trait]
impl FeedReader for StaticFeedReader {
    async fn fetch(&self, url: &str) -> FeedResult<Vec<u8>> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FeedError::ServerError {
                url: url.to_string(),
                status: 404,
            })
    }
}
