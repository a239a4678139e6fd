//! Error types for precache
//!
//! This module defines error types for all components of the application.
//! Per-source and per-model failures are absorbed by the component that owns
//! them; only feed failures on the primary documents and configuration
//! failures reach the top-level command.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading a remote feed document
#[derive(Error, Debug)]
pub enum FeedError {
    /// Transport failure, timeout or unusable document
    #[error("Feed unavailable: {url} - {reason}")]
    FeedUnavailable { url: String, reason: String },

    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned error status
    #[error("Server error reading {url}: HTTP {status}")]
    ServerError { url: String, status: u16 },

    /// Property list could not be parsed
    #[error("Property list parsing failed")]
    Plist(#[from] plist::Error),

    /// JSON document could not be parsed
    #[error("JSON parsing failed")]
    Json(#[from] serde_json::Error),

    /// A field was present but had an unexpected shape
    #[error("Malformed record field {field}: {reason}")]
    MalformedRecord { field: String, reason: String },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Firmware lookup errors, always scoped to a single model
#[derive(Error, Debug)]
pub enum LookupError {
    /// The lookup service failed or returned nothing usable
    #[error("Firmware lookup failed for {model}: {reason}")]
    LookupFailed { model: String, reason: String },

    /// The model has no firmware source
    #[error("No firmware source exists for {model}")]
    NotSupported { model: String },
}

/// Selection criteria errors
#[derive(Error, Debug)]
pub enum SelectionError {
    /// A requested firmware model is not in the capable list
    #[error("{model} is not a valid model. Pick from {known:?}")]
    InvalidSelection { model: String, known: Vec<String> },

    /// Nothing was requested on the command line or in configuration
    #[error("No models, groups, apps, updates or firmware requested")]
    NoCriteria,
}

/// Download and caching server errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// A required value could not be resolved from any source
    #[error("Missing required configuration value: {field}")]
    ConfigurationMissing { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Feed error
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Firmware lookup error
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Selection error
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if processing can continue with other items after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Lookup(_)
            | AppError::Selection(SelectionError::InvalidSelection { .. })
            | AppError::Download(_) => true,

            AppError::Feed(_)
            | AppError::Selection(SelectionError::NoCriteria)
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Feed(_) => "feed",
            AppError::Lookup(_) => "lookup",
            AppError::Selection(_) => "selection",
            AppError::Download(_) => "download",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Feed result type alias
pub type FeedResult<T> = std::result::Result<T, FeedError>;

/// Lookup result type alias
pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Selection result type alias
pub type SelectionResult<T> = std::result::Result<T, SelectionError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = AppError::from(LookupError::NotSupported {
            model: "Watch2,3".to_string(),
        });
        assert_eq!(err.category(), "lookup");
        assert!(err.is_recoverable());

        let err = AppError::from(FeedError::FeedUnavailable {
            url: "https://swscan.apple.com/".to_string(),
            reason: "timed out".to_string(),
        });
        assert_eq!(err.category(), "feed");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_selection_error_display() {
        let err = SelectionError::InvalidSelection {
            model: "iPad99,1".to_string(),
            known: vec!["iPad6,8".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("iPad99,1"));
        assert!(message.contains("iPad6,8"));
        assert!(!AppError::from(SelectionError::NoCriteria).is_recoverable());
    }
}
