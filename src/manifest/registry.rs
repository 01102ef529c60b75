//! Manifest registry
//!
//! A snapshot of the apps a manifest-scheme deployment currently serves.
//! Snapshots are always built from a fresh fetch of the manifest-list index
//! and every listed manifest; the registry is never persisted.

use super::descriptor::{parse_manifest_list, ManifestDescriptor};
use crate::error::{ShelfError, ShelfResult};
use crate::fetch::{Fetcher, Request};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

/// Where a registry entry came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Fetched manifest
    Manifest {
        url: Url,
        descriptor: ManifestDescriptor,
    },

    /// Recovered from an existing partition name (no manifest available)
    Partition,
}

/// One app known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub short_name: String,
    pub source: EntrySource,
}

/// Snapshot of the current manifest set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Build a registry from already-fetched manifests
    pub fn from_manifests(manifests: Vec<(Url, ManifestDescriptor)>) -> Self {
        let mut registry = Self::default();
        for (url, descriptor) in manifests {
            if registry.find(&descriptor.short_name).is_some() {
                warn!(
                    "Duplicate manifest short_name '{}' at {}, keeping first",
                    descriptor.short_name, url
                );
                continue;
            }
            registry.entries.push(RegistryEntry {
                short_name: descriptor.short_name.clone(),
                source: EntrySource::Manifest { url, descriptor },
            });
        }
        registry
    }

    /// Rebuild a registry from partition names that carry `prefix`
    pub fn from_partition_names(names: &[String], prefix: &str) -> Self {
        let entries = names
            .iter()
            .filter_map(|name| name.strip_prefix(prefix))
            .filter(|short| !short.is_empty())
            .map(|short| RegistryEntry {
                short_name: short.to_string(),
                source: EntrySource::Partition,
            })
            .collect();
        Self { entries }
    }

    /// Fetch the manifest-list index and every manifest it lists
    ///
    /// Any failure is fatal: an index that cannot be fetched or parsed is
    /// `ManifestIndex`, an unreachable manifest is `ManifestFetch`.
    pub async fn load(fetcher: &dyn Fetcher, index_url: &Url) -> ShelfResult<Self> {
        let response = fetcher
            .fetch(&Request::get(index_url.clone()))
            .await
            .map_err(|e| ShelfError::ManifestIndex {
                url: index_url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.is_ok() {
            return Err(ShelfError::ManifestIndex {
                url: index_url.to_string(),
                reason: format!("HTTP {}", response.status),
            });
        }

        let manifest_urls = parse_manifest_list(index_url, response.body())?;
        debug!("Manifest list {} names {} manifests", index_url, manifest_urls.len());

        let mut manifests = Vec::with_capacity(manifest_urls.len());
        for url in manifest_urls {
            let response = fetcher
                .fetch(&Request::get(url.clone()))
                .await
                .map_err(|e| ShelfError::ManifestFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            if !response.is_ok() {
                return Err(ShelfError::ManifestFetch {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }
            let descriptor = ManifestDescriptor::parse(&url, response.body())?;
            manifests.push((url, descriptor));
        }

        let registry = Self::from_manifests(manifests);
        info!("Loaded {} manifests from {}", registry.len(), index_url);
        Ok(registry)
    }

    /// Find the entry for an app identity
    pub fn find(&self, short_name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.short_name == short_name)
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Partition names this snapshot considers valid
    pub fn partition_names(&self, prefix: &str) -> HashSet<String> {
        self.entries
            .iter()
            .map(|e| format!("{}{}", prefix, e.short_name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
