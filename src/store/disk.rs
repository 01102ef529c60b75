//! Directory-backed partition store
//!
//! Layout under the store root:
//!
//! ```text
//! index.json                 partitions in creation order
//! p-<name hash>/entries.json entries in insertion order
//! p-<name hash>/<key hash>.body
//! ```
//!
//! Directory and body file names are SHA256 prefixes, so partition names and
//! URLs never touch the filesystem directly. JSON files are replaced through
//! a temp file + rename.

use super::{Partition, PartitionStore};
use crate::error::{ShelfError, ShelfResult};
use crate::fetch::{RequestKey, Response, ResponseKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.json";
const ENTRIES_FILE: &str = "entries.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartitionRecord {
    name: String,
    dir: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryRecord {
    key: RequestKey,
    status: u16,
    kind: ResponseKind,
    headers: Vec<(String, String)>,
    body_file: String,
    stored_at: DateTime<Utc>,
}

/// Partition store persisted under a root directory
pub struct DiskStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

/// SHA256 of `input`, first `bytes` bytes as hex
fn short_hash(input: &str, bytes: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..bytes])
}

fn partition_dir_name(name: &str) -> String {
    format!("p-{}", short_hash(name, 8))
}

fn body_file_name(key: &RequestKey) -> String {
    format!("{}.body", short_hash(&key.to_string(), 12))
}

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> ShelfResult<T> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(ShelfError::io(format!("reading {}", path.display()), e)),
    };
    serde_json::from_str(&content).map_err(|e| ShelfError::StoreCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

async fn write_atomic(path: &Path, content: &[u8]) -> ShelfResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)
        .await
        .map_err(|e| ShelfError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| ShelfError::io(format!("replacing {}", path.display()), e))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> ShelfResult<()> {
    let content = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &content).await
}

impl DiskStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn new(root: impl Into<PathBuf>) -> ShelfResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| ShelfError::io(format!("creating store {}", root.display()), e))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    async fn index(&self) -> ShelfResult<Vec<PartitionRecord>> {
        read_json(&self.index_path()).await
    }

    async fn find(&self, name: &str) -> ShelfResult<Option<PathBuf>> {
        Ok(self
            .index()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| self.root.join(p.dir)))
    }

    async fn require(&self, partition: &Partition) -> ShelfResult<PathBuf> {
        self.find(partition.name())
            .await?
            .ok_or_else(|| ShelfError::PartitionNotFound(partition.name().to_string()))
    }
}

#[async_trait]
impl PartitionStore for DiskStore {
    async fn open(&self, name: &str) -> ShelfResult<Partition> {
        let _guard = self.write_lock.lock().await;

        let mut index = self.index().await?;
        if index.iter().any(|p| p.name == name) {
            return Ok(Partition::new(name));
        }

        let dir = partition_dir_name(name);
        let path = self.root.join(&dir);
        fs::create_dir_all(&path)
            .await
            .map_err(|e| ShelfError::io(format!("creating partition {}", path.display()), e))?;

        index.push(PartitionRecord {
            name: name.to_string(),
            dir,
            created_at: Utc::now(),
        });
        write_json(&self.index_path(), &index).await?;

        debug!("Created partition {}", name);
        Ok(Partition::new(name))
    }

    async fn lookup(
        &self,
        partition: &Partition,
        key: &RequestKey,
    ) -> ShelfResult<Option<Response>> {
        let Some(dir) = self.find(partition.name()).await? else {
            return Ok(None);
        };

        let entries: Vec<EntryRecord> = read_json(&dir.join(ENTRIES_FILE)).await?;
        let Some(entry) = entries.into_iter().find(|e| &e.key == key) else {
            return Ok(None);
        };

        let body_path = dir.join(&entry.body_file);
        let body = fs::read(&body_path).await.map_err(|e| ShelfError::StoreCorrupt {
            path: body_path.clone(),
            reason: e.to_string(),
        })?;

        let mut response = Response::new(entry.status, entry.kind, body);
        response.headers = entry.headers;
        Ok(Some(response))
    }

    async fn insert(
        &self,
        partition: &Partition,
        key: RequestKey,
        response: Response,
    ) -> ShelfResult<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.require(partition).await?;

        let body_file = body_file_name(&key);
        let status = response.status;
        let kind = response.kind;
        let headers = response.headers.clone();
        write_atomic(&dir.join(&body_file), &response.into_body()).await?;

        let entries_path = dir.join(ENTRIES_FILE);
        let mut entries: Vec<EntryRecord> = read_json(&entries_path).await?;
        entries.retain(|e| e.key != key);
        entries.push(EntryRecord {
            key,
            status,
            kind,
            headers,
            body_file,
            stored_at: Utc::now(),
        });
        write_json(&entries_path, &entries).await
    }

    async fn keys(&self, partition: &Partition) -> ShelfResult<Vec<RequestKey>> {
        let dir = self.require(partition).await?;
        let entries: Vec<EntryRecord> = read_json(&dir.join(ENTRIES_FILE)).await?;
        Ok(entries.into_iter().map(|e| e.key).collect())
    }

    async fn partition_names(&self) -> ShelfResult<Vec<String>> {
        Ok(self.index().await?.into_iter().map(|p| p.name).collect())
    }

    async fn delete(&self, name: &str) -> ShelfResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut index = self.index().await?;
        let Some(pos) = index.iter().position(|p| p.name == name) else {
            return Ok(false);
        };
        let record = index.remove(pos);
        write_json(&self.index_path(), &index).await?;

        // The partition is gone once unindexed; leftover files are only garbage
        let path = self.root.join(&record.dir);
        if let Err(e) = fs::remove_dir_all(&path).await {
            warn!("Failed to remove partition files {}: {}", path.display(), e);
        }

        debug!("Deleted partition {}", name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(url: &str) -> RequestKey {
        RequestKey {
            method: "GET".to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn hashes_are_stable() {
        assert_eq!(partition_dir_name("a"), partition_dir_name("a"));
        assert_ne!(partition_dir_name("a"), partition_dir_name("b"));
        assert_eq!(partition_dir_name("a").len(), 2 + 16);
        assert!(body_file_name(&key("http://h/x")).ends_with(".body"));
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let temp = TempDir::new().unwrap();

        {
            let store = DiskStore::new(temp.path()).await.unwrap();
            let part = store.open("User-Manager-cache-v2").await.unwrap();
            let response = Response::new(200, ResponseKind::Basic, "<html></html>")
                .with_header("content-type", "text/html");
            store
                .insert(&part, key("http://h/User-Manager/index.html"), response)
                .await
                .unwrap();
        }

        let store = DiskStore::new(temp.path()).await.unwrap();
        assert_eq!(
            store.partition_names().await.unwrap(),
            vec!["User-Manager-cache-v2"]
        );
        let part = store.open("User-Manager-cache-v2").await.unwrap();
        let hit = store
            .lookup(&part, &key("http://h/User-Manager/index.html"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.body(), b"<html></html>");
        assert_eq!(hit.header("Content-Type"), Some("text/html"));
    }

    #[tokio::test]
    async fn insert_replaces_entry() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::new(temp.path()).await.unwrap();
        let part = store.open("p").await.unwrap();

        for body in ["one", "two"] {
            store
                .insert(&part, key("http://h/a"), Response::new(200, ResponseKind::Basic, body))
                .await
                .unwrap();
        }
        store
            .insert(&part, key("http://h/b"), Response::new(200, ResponseKind::Basic, "b"))
            .await
            .unwrap();

        assert_eq!(
            store.keys(&part).await.unwrap(),
            vec![key("http://h/a"), key("http://h/b")]
        );
        let hit = store.lookup(&part, &key("http://h/a")).await.unwrap().unwrap();
        assert_eq!(hit.body(), b"two");
    }

    #[tokio::test]
    async fn delete_removes_files() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::new(temp.path()).await.unwrap();
        let part = store.open("old-cache-v1").await.unwrap();
        store
            .insert(&part, key("http://h/a"), Response::new(200, ResponseKind::Basic, "a"))
            .await
            .unwrap();

        assert!(store.delete("old-cache-v1").await.unwrap());
        assert!(!store.delete("old-cache-v1").await.unwrap());
        assert!(store.partition_names().await.unwrap().is_empty());
        assert!(!temp.path().join(partition_dir_name("old-cache-v1")).exists());
        assert!(store.lookup(&part, &key("http://h/a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_index_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(INDEX_FILE), "not json").unwrap();
        let store = DiskStore::new(temp.path()).await.unwrap();

        let err = store.partition_names().await.unwrap_err();
        assert!(matches!(err, ShelfError::StoreCorrupt { .. }));
    }
}
