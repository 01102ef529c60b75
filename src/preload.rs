//! Resource preloading
//!
//! Preloading is all-or-nothing per partition: every resource is fetched
//! first, and the partition is opened and written only once the whole batch
//! succeeded. [`Preloader::install`] extends this across partitions by
//! staging every plan before committing any.

use crate::apps::AppTable;
use crate::error::{ShelfError, ShelfResult};
use crate::fetch::{resolve_url, Fetcher, Request, RequestKey, Response};
use crate::manifest::{EntrySource, Registry};
use crate::store::PartitionStore;
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Resources to preload into one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadPlan {
    pub partition: String,
    pub resources: Vec<Url>,
}

impl PreloadPlan {
    pub fn new(partition: impl Into<String>, resources: Vec<Url>) -> Self {
        Self {
            partition: partition.into(),
            resources,
        }
    }
}

/// A fully fetched plan, not yet written
#[derive(Debug)]
pub struct StagedPlan {
    partition: String,
    entries: Vec<(RequestKey, Response)>,
}

impl StagedPlan {
    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Partitions written by an install, with entry counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub partitions: Vec<(String, usize)>,
}

impl InstallSummary {
    pub fn total(&self) -> usize {
        self.partitions.iter().map(|(_, n)| n).sum()
    }
}

/// Build the plans of a versioned deployment
///
/// One plan per configured app (its scope, the shared precache list and the
/// app's own resources), plus the global partition's plan when any global
/// resources are configured.
pub fn plan_versioned(table: &AppTable, origin: &Url) -> ShelfResult<Vec<PreloadPlan>> {
    let mut plans = Vec::with_capacity(table.len() + 1);

    for app in table.apps() {
        let scope = resolve_url(origin, &app.scope)?;
        let mut resources = vec![scope.clone()];
        for resource in &app.resources {
            let url = resolve_url(&scope, resource)?;
            if !resources.contains(&url) {
                resources.push(url);
            }
        }
        plans.push(PreloadPlan::new(app.partition.clone(), resources));
    }

    if !table.global_resources().is_empty() {
        let resources = table
            .global_resources()
            .iter()
            .map(|r| resolve_url(origin, r))
            .collect::<ShelfResult<Vec<_>>>()?;
        plans.push(PreloadPlan::new(table.global_partition(), resources));
    }

    Ok(plans)
}

/// Build one plan per manifest of a registry snapshot
pub fn plans_for_registry(registry: &Registry, prefix: &str) -> ShelfResult<Vec<PreloadPlan>> {
    let mut plans = Vec::with_capacity(registry.len());
    for entry in registry.entries() {
        if let EntrySource::Manifest { url, descriptor } = &entry.source {
            plans.push(PreloadPlan::new(
                format!("{}{}", prefix, entry.short_name),
                descriptor.resources(url)?,
            ));
        }
    }
    Ok(plans)
}

/// Fetch the manifest list and every manifest, then plan each one
///
/// Any index or manifest failure is fatal.
pub async fn plan_from_manifests(
    fetcher: &dyn Fetcher,
    index_url: &Url,
    prefix: &str,
) -> ShelfResult<(Registry, Vec<PreloadPlan>)> {
    let registry = Registry::load(fetcher, index_url).await?;
    let plans = plans_for_registry(&registry, prefix)?;
    Ok((registry, plans))
}

/// Fetches plans and writes them into partitions
pub struct Preloader {
    store: Arc<dyn PartitionStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl Preloader {
    pub fn new(store: Arc<dyn PartitionStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Fetch every resource of a plan without touching the store
    pub async fn stage(&self, plan: &PreloadPlan) -> ShelfResult<StagedPlan> {
        debug!(
            "Staging {} resources for {}",
            plan.resources.len(),
            plan.partition
        );

        let fetches = plan.resources.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response =
                self.fetcher
                    .fetch(&request)
                    .await
                    .map_err(|e| ShelfError::PreloadFailed {
                        partition: plan.partition.clone(),
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;

            if !response.is_ok() {
                return Err(ShelfError::PreloadFailed {
                    partition: plan.partition.clone(),
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status),
                });
            }

            Ok((request.key(), response))
        });

        let entries = try_join_all(fetches).await?;
        Ok(StagedPlan {
            partition: plan.partition.clone(),
            entries,
        })
    }

    /// Open the staged plan's partition and write every entry
    pub async fn commit(&self, staged: StagedPlan) -> ShelfResult<usize> {
        let partition = self.store.open(&staged.partition).await?;
        let count = staged.entries.len();
        for (key, response) in staged.entries {
            self.store.insert(&partition, key, response).await?;
        }
        debug!("Committed {} entries to {}", count, partition);
        Ok(count)
    }

    /// Preload one partition
    pub async fn preload(&self, plan: &PreloadPlan) -> ShelfResult<usize> {
        let staged = self.stage(plan).await?;
        self.commit(staged).await
    }

    /// Stage every plan, then commit them all
    ///
    /// A failing plan leaves every partition untouched, including the ones
    /// whose plans came before it.
    pub async fn install(&self, plans: &[PreloadPlan]) -> ShelfResult<InstallSummary> {
        let mut staged = Vec::with_capacity(plans.len());
        for plan in plans {
            staged.push(self.stage(plan).await?);
        }

        let mut summary = InstallSummary::default();
        for plan in staged {
            let partition = plan.partition().to_string();
            let count = self.commit(plan).await?;
            summary.partitions.push((partition, count));
        }

        info!(
            "Preloaded {} resources into {} partitions",
            summary.total(),
            summary.partitions.len()
        );
        Ok(summary)
    }
}
