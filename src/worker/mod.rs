//! Lifecycle worker
//!
//! Ties the three checkpoints together:
//!
//! ```text
//! parsed ──install──▶ installing ──▶ installed ──activate──▶ activating ──▶ activated
//!                         │
//!                         └── preload failure ──▶ redundant
//! ```
//!
//! Install is a hard barrier: a worker whose preload failed never activates.
//! Activation reclaims stale partitions and then swaps in a router built
//! against the current scheme and registry. Requests that already picked up
//! the previous router finish against it.

pub mod state;

pub use state::{LifecycleRecord, WorkerState};

use crate::apps::AppTable;
use crate::config::Config;
use crate::error::{ShelfError, ShelfResult};
use crate::fetch::{resolve_url, Fetcher, Request};
use crate::manifest::Registry;
use crate::preload::{plan_from_manifests, plan_versioned, InstallSummary, Preloader};
use crate::reclaim::{ReclaimReport, Reclaimer};
use crate::resolve::{Resolver, Scheme};
use crate::router::{Interception, Router};
use crate::store::PartitionStore;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use url::Url;

/// What activation did about stale partitions
#[derive(Debug)]
pub enum ReclaimOutcome {
    Completed(ReclaimReport),
    /// Reclamation source unavailable; every partition was left in place
    Aborted(ShelfError),
}

/// One deployment's lifecycle driver
pub struct Worker {
    config: Config,
    table: AppTable,
    origin: Url,
    index_url: Url,
    store: Arc<dyn PartitionStore>,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<WorkerState>,
    router: RwLock<Arc<Router>>,
}

impl Worker {
    pub fn new(
        config: &Config,
        store: Arc<dyn PartitionStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> ShelfResult<Self> {
        let origin = Url::parse(&config.network.origin).map_err(|e| ShelfError::InvalidUrl {
            url: config.network.origin.clone(),
            reason: e.to_string(),
        })?;
        let index_url = resolve_url(&origin, &config.manifest.index_url)?;

        let resolver = Resolver::from_config(config, Registry::default());
        let router = Router::new(resolver, Arc::clone(&store), Arc::clone(&fetcher));

        Ok(Self {
            config: config.clone(),
            table: AppTable::from_config(config),
            origin,
            index_url,
            store,
            fetcher,
            state: Mutex::new(WorkerState::Parsed),
            router: RwLock::new(Arc::new(router)),
        })
    }

    pub fn table(&self) -> &AppTable {
        &self.table
    }

    pub fn scheme(&self) -> &Scheme {
        self.table.scheme()
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Current router snapshot
    pub async fn router(&self) -> Arc<Router> {
        Arc::clone(&*self.router.read().await)
    }

    /// Resume a checkpoint reached by an earlier process
    ///
    /// An activated worker gets a router whose registry is rebuilt from the
    /// partition names on disk, so no manifest is fetched.
    pub async fn restore(&self, state: WorkerState) -> ShelfResult<()> {
        if !state.is_settled() {
            return Err(ShelfError::LifecycleState {
                expected: "a settled state",
                actual: state.as_str(),
            });
        }

        if state == WorkerState::Activated {
            let registry = match self.scheme() {
                Scheme::Manifest { prefix } => {
                    let names = self.store.partition_names().await?;
                    Registry::from_partition_names(&names, prefix)
                }
                Scheme::Versioned { .. } => Registry::default(),
            };
            self.swap_router(registry).await;
        }

        *self.state.lock().await = state;
        Ok(())
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> ShelfResult<()> {
        let mut state = self.state.lock().await;
        if *state != from {
            return Err(ShelfError::LifecycleState {
                expected: from.as_str(),
                actual: state.as_str(),
            });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.lock().await = to;
    }

    /// Preload every partition the deployment declares
    pub async fn install(&self) -> ShelfResult<InstallSummary> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)
            .await?;
        info!("Installing ({})", self.scheme());

        match self.preload_all().await {
            Ok(summary) => {
                self.set_state(WorkerState::Installed).await;
                info!("Installed {} partitions", summary.partitions.len());
                Ok(summary)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                warn!("Install failed, worker is redundant: {}", e);
                Err(e)
            }
        }
    }

    async fn preload_all(&self) -> ShelfResult<InstallSummary> {
        let plans = match self.scheme() {
            Scheme::Versioned { .. } => plan_versioned(&self.table, &self.origin)?,
            Scheme::Manifest { prefix } => {
                let (_, plans) =
                    plan_from_manifests(self.fetcher.as_ref(), &self.index_url, prefix).await?;
                plans
            }
        };

        let preloader = Preloader::new(Arc::clone(&self.store), Arc::clone(&self.fetcher));
        preloader.install(&plans).await
    }

    /// Reclaim stale partitions and start routing with the current set
    pub async fn activate(&self) -> ShelfResult<ReclaimOutcome> {
        self.transition(WorkerState::Installed, WorkerState::Activating)
            .await?;
        info!("Activating ({})", self.scheme());

        let reclaimer = Reclaimer::new(Arc::clone(&self.store), Arc::clone(&self.fetcher));
        let global = self.table.global_partition().to_string();

        let result = reclaimer
            .reclaim(self.scheme(), &global, &self.index_url)
            .await;

        let (registry, outcome) = match result {
            Ok((registry, report)) => (registry.unwrap_or_default(), ReclaimOutcome::Completed(report)),
            Err(e @ ShelfError::ReclaimAborted { .. }) => {
                let registry = match self.scheme() {
                    Scheme::Manifest { prefix } => {
                        let names = self.store.partition_names().await?;
                        Registry::from_partition_names(&names, prefix)
                    }
                    Scheme::Versioned { .. } => Registry::default(),
                };
                (registry, ReclaimOutcome::Aborted(e))
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                return Err(e);
            }
        };

        self.swap_router(registry).await;
        self.set_state(WorkerState::Activated).await;
        info!("Activated");
        Ok(outcome)
    }

    async fn swap_router(&self, registry: Registry) {
        let resolver = Resolver::from_config(&self.config, registry);
        let router = Router::new(resolver, Arc::clone(&self.store), Arc::clone(&self.fetcher));
        *self.router.write().await = Arc::new(router);
    }

    /// Intercept a request; everything passes through until activation
    pub async fn intercept(&self, request: &Request) -> ShelfResult<Interception> {
        if self.state().await != WorkerState::Activated {
            return Ok(Interception::PassThrough);
        }
        let router = self.router().await;
        router.intercept(request).await
    }
}
