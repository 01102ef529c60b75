//! Error types for Shelf
//!
//! All modules use `ShelfResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Shelf operations
pub type ShelfResult<T> = Result<T, ShelfError>;

/// All errors that can occur in Shelf
#[derive(Error, Debug)]
pub enum ShelfError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Network errors
    #[error("Network request failed: {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Network request timed out after {secs}s: {url}")]
    Timeout { url: String, secs: u64 },

    #[error("Invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Manifest errors
    #[error("Manifest list unavailable at {url}: {reason}")]
    ManifestIndex { url: String, reason: String },

    #[error("Manifest unavailable at {url}: {reason}")]
    ManifestFetch { url: String, reason: String },

    #[error("Invalid manifest at {url}: {reason}")]
    ManifestInvalid { url: String, reason: String },

    // Lifecycle errors
    #[error("Preload of partition {partition} failed at {url}: {reason}")]
    PreloadFailed {
        partition: String,
        url: String,
        reason: String,
    },

    #[error("Reclamation aborted, partitions left untouched: {reason}")]
    ReclaimAborted { reason: String },

    #[error("Worker is {actual}, expected {expected}")]
    LifecycleState {
        expected: &'static str,
        actual: &'static str,
    },

    // Store errors
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    #[error("Failed to write to partition {partition}: {reason}")]
    CacheWrite { partition: String, reason: String },

    #[error("Corrupt store data at {path}: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    // Record errors
    #[error("Record not found: {0}")]
    RecordNotFound(u64),

    #[error("Invalid record store name '{0}'")]
    InvalidStoreName(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShelfError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::ManifestIndex { .. }
                | Self::ManifestFetch { .. }
                | Self::PreloadFailed { .. }
                | Self::ReclaimAborted { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => {
                Some("Check that network.origin points at a running server")
            }
            Self::ManifestIndex { .. } => {
                Some("Check manifest.index_url; the manifest list must be a JSON array of URLs")
            }
            Self::PreloadFailed { .. } => {
                Some("Every precached resource must be reachable at install time")
            }
            Self::ReclaimAborted { .. } => {
                Some("Stale partitions stay until the next activation: shelf update")
            }
            Self::LifecycleState { .. } => Some("Run: shelf install"),
            Self::InvalidStoreName(_) => {
                Some("Store names are plain file names without '/', '\\' or '..'")
            }
            _ => None,
        }
    }
}
