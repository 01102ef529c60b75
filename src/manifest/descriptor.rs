//! Web app manifest parsing
//!
//! Only the fields the cache core reads are modeled; everything else in the
//! manifest is ignored.

use crate::error::{ShelfError, ShelfResult};
use crate::fetch::resolve_url;
use serde::Deserialize;
use url::Url;

/// One icon entry of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestIcon {
    /// Icon location, relative to the manifest
    pub src: String,

    #[serde(default)]
    pub sizes: Option<String>,

    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
}

/// Parsed per-app manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestDescriptor {
    /// Short name; names the app's partition
    pub short_name: String,

    /// Entry document, relative to the manifest
    pub start_url: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub icons: Vec<ManifestIcon>,
}

impl ManifestDescriptor {
    /// Parse a manifest body fetched from `url`
    pub fn parse(url: &Url, body: &[u8]) -> ShelfResult<Self> {
        let manifest: Self =
            serde_json::from_slice(body).map_err(|e| ShelfError::ManifestInvalid {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if manifest.short_name.trim().is_empty() {
            return Err(ShelfError::ManifestInvalid {
                url: url.to_string(),
                reason: "short_name is empty".to_string(),
            });
        }

        Ok(manifest)
    }

    /// Resources to precache: start URL, the manifest itself, then icons
    ///
    /// Relative references resolve against the manifest location. Duplicates
    /// are dropped, keeping the first occurrence.
    pub fn resources(&self, manifest_url: &Url) -> ShelfResult<Vec<Url>> {
        let mut resources = Vec::with_capacity(self.icons.len() + 2);
        resources.push(resolve_url(manifest_url, &self.start_url)?);
        resources.push(manifest_url.clone());
        for icon in &self.icons {
            resources.push(resolve_url(manifest_url, &icon.src)?);
        }

        let mut seen = std::collections::HashSet::new();
        resources.retain(|u| seen.insert(u.to_string()));
        Ok(resources)
    }
}

/// Parse the manifest-list index: a JSON array of manifest URLs
pub fn parse_manifest_list(url: &Url, body: &[u8]) -> ShelfResult<Vec<Url>> {
    let entries: Vec<String> =
        serde_json::from_slice(body).map_err(|e| ShelfError::ManifestIndex {
            url: url.to_string(),
            reason: format!("not a JSON array of URLs: {}", e),
        })?;

    entries
        .iter()
        .map(|entry| resolve_url(url, entry))
        .collect()
}
