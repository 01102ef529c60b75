//! Generation reclaimer
//!
//! Deletes partitions left behind by earlier deployments. Staleness depends
//! on the naming scheme:
//!
//! - versioned: a partition is current iff its name ends with the current
//!   `-cache-{version}` suffix
//! - manifest: a partition is current iff a manifest in a fresh registry
//!   snapshot names it
//!
//! The global partition is never reclaimed. Deletions run concurrently; one
//! failed deletion does not stop the others.

use crate::error::{ShelfError, ShelfResult};
use crate::fetch::Fetcher;
use crate::manifest::Registry;
use crate::resolve::Scheme;
use crate::store::PartitionStore;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of one reclamation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    /// Partitions whose deletion failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl ReclaimReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Split partition names into (kept, stale) for a versioned deployment
pub fn stale_versioned(names: &[String], scheme: &Scheme, global: &str) -> (Vec<String>, Vec<String>) {
    let suffix = scheme.version_suffix();
    names.iter().cloned().partition(|name| {
        name == global || suffix.as_deref().is_some_and(|s| name.ends_with(s))
    })
}

/// Split partition names into (kept, stale) against a registry snapshot
pub fn stale_manifest(
    names: &[String],
    registry: &Registry,
    prefix: &str,
    global: &str,
) -> (Vec<String>, Vec<String>) {
    let valid = registry.partition_names(prefix);
    names
        .iter()
        .cloned()
        .partition(|name| name == global || valid.contains(name))
}

/// Deletes stale partitions
pub struct Reclaimer {
    store: Arc<dyn PartitionStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl Reclaimer {
    pub fn new(store: Arc<dyn PartitionStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Reclaim partitions not carrying the current version suffix
    pub async fn reclaim_versioned(
        &self,
        scheme: &Scheme,
        global: &str,
    ) -> ShelfResult<ReclaimReport> {
        let names = self.store.partition_names().await?;
        let (kept, stale) = stale_versioned(&names, scheme, global);
        Ok(self.delete_all(kept, stale).await)
    }

    /// Reclaim partitions no current manifest names
    ///
    /// Fetches a fresh registry first. If the index or any listed manifest
    /// cannot be fetched, nothing is deleted and the pass is aborted. The
    /// fresh registry is returned alongside the report.
    pub async fn reclaim_manifests(
        &self,
        index_url: &Url,
        prefix: &str,
        global: &str,
    ) -> ShelfResult<(Registry, ReclaimReport)> {
        let registry = Registry::load(self.fetcher.as_ref(), index_url)
            .await
            .map_err(|e| {
                warn!("Skipping reclamation: {}", e);
                ShelfError::ReclaimAborted {
                    reason: e.to_string(),
                }
            })?;

        let names = self.store.partition_names().await?;
        let (kept, stale) = stale_manifest(&names, &registry, prefix, global);
        let report = self.delete_all(kept, stale).await;
        Ok((registry, report))
    }

    /// Reclaim according to the deployment's scheme
    pub async fn reclaim(
        &self,
        scheme: &Scheme,
        global: &str,
        index_url: &Url,
    ) -> ShelfResult<(Option<Registry>, ReclaimReport)> {
        match scheme {
            Scheme::Versioned { .. } => {
                let report = self.reclaim_versioned(scheme, global).await?;
                Ok((None, report))
            }
            Scheme::Manifest { prefix } => {
                let (registry, report) = self.reclaim_manifests(index_url, prefix, global).await?;
                Ok((Some(registry), report))
            }
        }
    }

    async fn delete_all(&self, kept: Vec<String>, stale: Vec<String>) -> ReclaimReport {
        let deletions = stale.into_iter().map(|name| async move {
            let result = self.store.delete(&name).await;
            (name, result)
        });

        let mut report = ReclaimReport {
            kept,
            ..Default::default()
        };

        for (name, result) in join_all(deletions).await {
            match result {
                Ok(existed) => {
                    if !existed {
                        debug!("Partition {} was already gone", name);
                    }
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!("Failed to delete partition {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        info!(
            "Reclaimed {} partitions ({} kept, {} failed)",
            report.deleted.len(),
            report.kept.len(),
            report.failed.len()
        );
        report
    }
}
