//! Configuration schema for Shelf
//!
//! Configuration is stored at `~/.config/shelf/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Partition naming, precache and routing settings
    pub cache: CacheConfig,

    /// Manifest registry settings
    pub manifest: ManifestConfig,

    /// Network fetch settings
    pub network: NetworkConfig,

    /// Storage locations
    pub store: StoreConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Which partition naming and staleness scheme a deployment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    /// `{app}-cache-{version}`, stale when the version suffix differs
    Versioned,
    /// `{prefix}{short_name}`, stale when no current manifest names it
    Manifest,
}

/// Per-application entry in the configuration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application identity (the path segment that names it)
    pub name: String,

    /// Path prefix the app is served under (default `/{name}/`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Extra resources to precache besides the shared precache list
    #[serde(default)]
    pub resources: Vec<String>,
}

impl AppConfig {
    /// Scope prefix, always with leading and trailing slashes
    pub fn scope(&self) -> String {
        match &self.scope {
            Some(scope) => {
                let trimmed = scope.trim_matches('/');
                if trimmed.is_empty() {
                    "/".to_string()
                } else {
                    format!("/{}/", trimmed)
                }
            }
            None => format!("/{}/", self.name),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Naming scheme for this deployment
    pub scheme: SchemeKind,

    /// Current version tag (versioned scheme)
    pub version: String,

    /// Identity used when a request path has no app segment
    pub default_app: String,

    /// Index of the non-empty path segment that names the app
    pub app_segment: usize,

    /// Identity of the shared partition
    pub global_partition: String,

    /// Resources shared by every app, routed to the global partition
    pub global_resources: Vec<String>,

    /// Resources precached for every app, relative to its scope
    pub precache: Vec<String>,

    /// Applications served by this deployment
    pub apps: Vec<AppConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scheme: SchemeKind::Versioned,
            version: "v2".to_string(),
            default_app: "default-app".to_string(),
            app_segment: 0,
            global_partition: "global".to_string(),
            global_resources: vec![
                "/IndexedDBManager.js".to_string(),
                "/icons/icon-192x192.png".to_string(),
                "/icons/icon-512x512.png".to_string(),
            ],
            precache: vec!["index.html".to_string(), "manifest.json".to_string()],
            apps: vec![],
        }
    }
}

/// Manifest registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Prefix for manifest-derived partition names
    pub prefix: String,

    /// Location of the manifest-list index (absolute or origin-relative)
    pub index_url: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            prefix: "pwa-cache-".to_string(),
            index_url: "/PWA-APP/manifest-list.json".to_string(),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Origin that owns the cached apps; other origins are cross-origin
    pub origin: String,

    /// Upper bound for a single fetch, in seconds
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Partition store directory (defaults to the state dir)
    pub root: Option<PathBuf>,

    /// Record store directory (defaults to the state dir)
    pub records: Option<PathBuf>,
}

impl Config {
    /// Check values that deserialize fine but cannot work at runtime
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.version.trim().is_empty() {
            return Err("cache.version must not be empty".to_string());
        }
        if self.cache.default_app.is_empty() || self.cache.default_app.contains('/') {
            return Err("cache.default_app must be a single path segment".to_string());
        }
        for app in &self.cache.apps {
            if app.name.is_empty() || app.name.contains('/') {
                return Err(format!(
                    "cache.apps: invalid app name '{}': must be a single path segment",
                    app.name
                ));
            }
        }
        if self.network.timeout_secs == 0 {
            return Err("network.timeout_secs must be greater than zero".to_string());
        }
        url::Url::parse(&self.network.origin)
            .map_err(|e| format!("network.origin '{}': {}", self.network.origin, e))?;
        if self.cache.scheme == SchemeKind::Manifest && self.manifest.prefix.is_empty() {
            return Err("manifest.prefix must not be empty for the manifest scheme".to_string());
        }
        Ok(())
    }
}
