//! Interception router
//!
//! Per-request decision engine. For every request:
//!
//! | Step | Decision |
//! |------|----------|
//! | Resolve | global resource → global partition, else app partition |
//! | Scope | path outside the app's scope → pass through untouched |
//! | Lookup | stored response → serve it, no network |
//! | Fetch | cacheable (200, same-origin) → serve and store a copy |
//! |       | anything else → serve as-is, store nothing |
//!
//! Storing a fetched copy runs on a spawned task. The response path never
//! waits for it, and a failed write is only logged.

use crate::error::ShelfResult;
use crate::fetch::{Fetcher, Request, RequestKey, Response};
use crate::resolve::{Resolution, Resolver};
use crate::store::{Partition, PartitionStore};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How a handled request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stored response, no network
    Cache,
    /// Network response, copy being stored
    NetworkCached,
    /// Network response that is not cacheable
    NetworkUncached,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "served from cache"),
            Self::NetworkCached => write!(f, "served from network (cached)"),
            Self::NetworkUncached => write!(f, "served from network (not cached)"),
        }
    }
}

/// A request the router answered
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub outcome: Outcome,
    pub resolution: Resolution,
    /// Background cache write, present for [`Outcome::NetworkCached`]
    pub population: Option<JoinHandle<()>>,
}

/// Result of intercepting one request
#[derive(Debug)]
pub enum Interception {
    /// Not ours: leave the request to default network handling
    PassThrough,
    Handled(Served),
}

impl Interception {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }
}

/// Routes requests between partitions and the network
pub struct Router {
    resolver: Resolver,
    store: Arc<dyn PartitionStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl Router {
    pub fn new(
        resolver: Resolver,
        store: Arc<dyn PartitionStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            resolver,
            store,
            fetcher,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Find the partition that owns a request, if any
    pub fn route(&self, request: &Request) -> Option<Resolution> {
        if !request.is_get() {
            debug!("Ignoring {} request: {}", request.method(), request.url());
            return None;
        }

        let path = request.path();
        if let Some(global) = self.resolver.resolve_global(path) {
            return Some(global);
        }

        let Some(resolution) = self.resolver.resolve(path) else {
            debug!("No registered app owns {}", path);
            return None;
        };

        if !resolution.in_scope(path) {
            debug!(
                "{}: ignoring request outside app scope: {}",
                resolution.app, path
            );
            return None;
        }

        Some(resolution)
    }

    /// Handle one request
    ///
    /// Network failure with nothing stored is returned as the error; there is
    /// no offline fallback.
    pub async fn intercept(&self, request: &Request) -> ShelfResult<Interception> {
        let Some(resolution) = self.route(request) else {
            return Ok(Interception::PassThrough);
        };

        let served = self.serve_or_fetch(request, resolution).await?;
        Ok(Interception::Handled(served))
    }

    async fn serve_or_fetch(
        &self,
        request: &Request,
        resolution: Resolution,
    ) -> ShelfResult<Served> {
        let key = request.key();
        let partition = Partition::new(&resolution.partition);

        match self.store.lookup(&partition, &key).await {
            Ok(Some(response)) => {
                debug!("{}: serving from cache: {}", resolution.app, request.path());
                return Ok(Served {
                    response,
                    outcome: Outcome::Cache,
                    resolution,
                    population: None,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(
                "{}: cache lookup in {} failed, using network: {}",
                resolution.app, resolution.partition, e
            ),
        }

        debug!("{}: fetching from network: {}", resolution.app, request.path());
        let response = self.fetcher.fetch(request).await.map_err(|e| {
            warn!("{}: fetch failed: {}", resolution.app, e);
            e
        })?;

        if !response.is_cacheable() {
            debug!(
                "{}: not caching {} ({} {})",
                resolution.app,
                request.path(),
                response.status,
                response.kind
            );
            return Ok(Served {
                response,
                outcome: Outcome::NetworkUncached,
                resolution,
                population: None,
            });
        }

        let copy = response.duplicate();
        let population = self.populate(resolution.partition.clone(), key, copy);

        Ok(Served {
            response,
            outcome: Outcome::NetworkCached,
            resolution,
            population: Some(population),
        })
    }

    fn populate(&self, partition: String, key: RequestKey, response: Response) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let label = key.to_string();
            let result = async {
                let handle = store.open(&partition).await?;
                store.insert(&handle, key, response).await
            }
            .await;

            match result {
                Ok(()) => debug!("Cached {} in {}", label, partition),
                Err(e) => warn!("Cache write to {} failed for {}: {}", partition, label, e),
            }
        })
    }
}
