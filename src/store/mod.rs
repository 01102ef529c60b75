//! Partition cache store
//!
//! A store is a set of named partitions. Each partition maps a request
//! identity to at most one stored response, ordered by insertion; inserting
//! an identity again replaces the earlier entry and moves it to the end.
//!
//! # Engines
//!
//! | Engine | Backing | Use |
//! |--------|---------|-----|
//! | [`MemoryStore`] | process memory | tests, embedding |
//! | [`DiskStore`] | directory tree | the `shelf` binary |

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::error::ShelfResult;
use crate::fetch::{RequestKey, Response};
use async_trait::async_trait;
use std::fmt;

/// Handle to an opened partition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    name: String,
}

impl Partition {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Storage capability shared by every app behind one interception layer
///
/// Implementations must tolerate concurrent reads and writes to the same
/// partition from independent tasks.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Open a partition, creating it if absent
    async fn open(&self, name: &str) -> ShelfResult<Partition>;

    /// Look up a stored response; each call returns an independent copy
    async fn lookup(&self, partition: &Partition, key: &RequestKey)
        -> ShelfResult<Option<Response>>;

    /// Store a response, replacing any earlier one for the same identity
    async fn insert(
        &self,
        partition: &Partition,
        key: RequestKey,
        response: Response,
    ) -> ShelfResult<()>;

    /// Request identities stored in a partition, in insertion order
    async fn keys(&self, partition: &Partition) -> ShelfResult<Vec<RequestKey>>;

    /// Names of all partitions, in creation order
    async fn partition_names(&self) -> ShelfResult<Vec<String>>;

    /// Delete a partition; `false` if it did not exist
    async fn delete(&self, name: &str) -> ShelfResult<bool>;
}
