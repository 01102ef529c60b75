//! In-memory partition store

use super::{Partition, PartitionStore};
use crate::error::{ShelfError, ShelfResult};
use crate::fetch::{RequestKey, Response};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
struct Entries {
    items: Vec<(RequestKey, Response)>,
}

/// Partition store held in process memory
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<Vec<(String, Entries)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn open(&self, name: &str) -> ShelfResult<Partition> {
        let mut partitions = self.partitions.write().await;
        if !partitions.iter().any(|(n, _)| n == name) {
            partitions.push((name.to_string(), Entries::default()));
        }
        Ok(Partition::new(name))
    }

    async fn lookup(
        &self,
        partition: &Partition,
        key: &RequestKey,
    ) -> ShelfResult<Option<Response>> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|(n, _)| n == partition.name())
            .and_then(|(_, entries)| entries.items.iter().find(|(k, _)| k == key))
            .map(|(_, response)| response.duplicate()))
    }

    async fn insert(
        &self,
        partition: &Partition,
        key: RequestKey,
        response: Response,
    ) -> ShelfResult<()> {
        let mut partitions = self.partitions.write().await;
        let (_, entries) = partitions
            .iter_mut()
            .find(|(n, _)| n == partition.name())
            .ok_or_else(|| ShelfError::PartitionNotFound(partition.name().to_string()))?;

        entries.items.retain(|(k, _)| k != &key);
        entries.items.push((key, response));
        Ok(())
    }

    async fn keys(&self, partition: &Partition) -> ShelfResult<Vec<RequestKey>> {
        let partitions = self.partitions.read().await;
        let (_, entries) = partitions
            .iter()
            .find(|(n, _)| n == partition.name())
            .ok_or_else(|| ShelfError::PartitionNotFound(partition.name().to_string()))?;
        Ok(entries.items.iter().map(|(k, _)| k.clone()).collect())
    }

    async fn partition_names(&self) -> ShelfResult<Vec<String>> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn delete(&self, name: &str) -> ShelfResult<bool> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|(n, _)| n != name);
        Ok(partitions.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseKind;

    fn key(url: &str) -> RequestKey {
        RequestKey {
            method: "GET".to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let store = MemoryStore::new();
        store.open("appA-cache-v2").await.unwrap();
        store.open("appA-cache-v2").await.unwrap();
        store.open("global-cache-v2").await.unwrap();

        assert_eq!(
            store.partition_names().await.unwrap(),
            vec!["appA-cache-v2", "global-cache-v2"]
        );
    }

    #[tokio::test]
    async fn insert_replaces_and_reorders() {
        let store = MemoryStore::new();
        let part = store.open("p").await.unwrap();

        store
            .insert(&part, key("http://h/a"), Response::new(200, ResponseKind::Basic, "a1"))
            .await
            .unwrap();
        store
            .insert(&part, key("http://h/b"), Response::new(200, ResponseKind::Basic, "b"))
            .await
            .unwrap();
        store
            .insert(&part, key("http://h/a"), Response::new(200, ResponseKind::Basic, "a2"))
            .await
            .unwrap();

        let keys = store.keys(&part).await.unwrap();
        assert_eq!(keys, vec![key("http://h/b"), key("http://h/a")]);

        let hit = store.lookup(&part, &key("http://h/a")).await.unwrap().unwrap();
        assert_eq!(hit.body(), b"a2");
    }

    #[tokio::test]
    async fn lookup_is_scoped_to_partition() {
        let store = MemoryStore::new();
        let a = store.open("a").await.unwrap();
        let b = store.open("b").await.unwrap();
        store
            .insert(&a, key("http://h/x"), Response::new(200, ResponseKind::Basic, "x"))
            .await
            .unwrap();

        assert!(store.lookup(&a, &key("http://h/x")).await.unwrap().is_some());
        assert!(store.lookup(&b, &key("http://h/x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemoryStore::new();
        let part = store.open("p").await.unwrap();
        assert!(store.delete("p").await.unwrap());
        assert!(!store.delete("p").await.unwrap());

        let err = store
            .insert(&part, key("http://h/x"), Response::new(200, ResponseKind::Basic, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ShelfError::PartitionNotFound(_)));
    }
}
