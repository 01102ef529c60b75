//! CLI command implementations

pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod partitions;
pub mod records;
pub mod resolve;

pub use config::execute as config;
pub use fetch::execute as fetch;
pub use lifecycle::{activate, install, status, update};
pub use partitions::execute as partitions;
pub use records::execute as records;
pub use resolve::execute as resolve;

use crate::config::{Config, ConfigManager};
use crate::error::ShelfResult;
use crate::fetch::HttpFetcher;
use crate::store::DiskStore;
use crate::worker::{LifecycleRecord, Worker, WorkerState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Open the on-disk partition store
pub(crate) async fn open_store(config: &Config) -> ShelfResult<Arc<DiskStore>> {
    let root = ConfigManager::partitions_dir(config);
    debug!("Partition store: {}", root.display());
    Ok(Arc::new(DiskStore::new(root).await?))
}

/// A fresh worker plus the directory its lifecycle record lives in
pub(crate) async fn new_worker(config: &Config) -> ShelfResult<(Worker, PathBuf)> {
    let store = open_store(config).await?;
    let dir = store.root().to_path_buf();
    let fetcher = Arc::new(HttpFetcher::from_config(config)?);
    Ok((Worker::new(config, store, fetcher)?, dir))
}

/// A worker resumed at a checkpoint an earlier process recorded
///
/// `checkpoint` picks the state to resume from: the serving state for
/// request handling, the pending install for activation.
pub(crate) async fn resumed_worker(
    config: &Config,
    checkpoint: fn(&LifecycleRecord) -> WorkerState,
) -> ShelfResult<(Worker, Option<LifecycleRecord>, PathBuf)> {
    let (worker, dir) = new_worker(config).await?;
    let record = LifecycleRecord::load(&dir).await?;
    let state = record.as_ref().map(checkpoint).unwrap_or(WorkerState::Parsed);
    worker.restore(state).await?;
    Ok((worker, record, dir))
}
