//! Per-app record store
//!
//! A key-indexed store of JSON records with integer ids, used by apps next
//! to their cached resources. Each named store lives in one JSON file.

use crate::error::{ShelfError, ShelfResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// One stored record: an id plus application-defined fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// CRUD operations over one record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Prepare the backing storage; safe to call more than once
    async fn init(&self) -> ShelfResult<()>;

    /// Store new fields and return the allocated id
    async fn add(&self, fields: Map<String, Value>) -> ShelfResult<u64>;

    async fn get(&self, id: u64) -> ShelfResult<Option<Record>>;

    /// Replace an existing record
    async fn update(&self, record: Record) -> ShelfResult<()>;

    /// Delete a record; `false` if it did not exist
    async fn delete(&self, id: u64) -> ShelfResult<bool>;

    /// All records in id order
    async fn get_all(&self) -> ShelfResult<Vec<Record>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    next_id: u64,
    records: Vec<Record>,
}

/// Record store persisted as `{dir}/{name}.json`
pub struct FileRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRecordStore {
    /// Open the store named `name` under `dir`; the name must stay inside `dir`
    pub fn new(dir: &Path, name: &str) -> ShelfResult<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(ShelfError::InvalidStoreName(name.to_string()));
        }
        Ok(Self {
            path: dir.join(format!("{}.json", name)),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> ShelfResult<RecordFile> {
        if !self.path.exists() {
            return Ok(RecordFile {
                next_id: 1,
                records: vec![],
            });
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ShelfError::io(format!("reading {}", self.path.display()), e))?;

        serde_json::from_str(&content).map_err(|e| ShelfError::StoreCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    async fn write(&self, file: &RecordFile) -> ShelfResult<()> {
        let content = serde_json::to_string_pretty(file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| ShelfError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ShelfError::io(format!("replacing {}", self.path.display()), e))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn init(&self) -> ShelfResult<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ShelfError::io(format!("creating {}", parent.display()), e))?;
        }
        if !self.path.exists() {
            self.write(&RecordFile {
                next_id: 1,
                records: vec![],
            })
            .await?;
            debug!("Created record store {}", self.path.display());
        }
        Ok(())
    }

    async fn add(&self, mut fields: Map<String, Value>) -> ShelfResult<u64> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;

        let id = file.next_id.max(1);
        file.next_id = id + 1;
        fields.remove("id");
        file.records.push(Record { id, fields });

        self.write(&file).await?;
        Ok(id)
    }

    async fn get(&self, id: u64) -> ShelfResult<Option<Record>> {
        let file = self.read().await?;
        Ok(file.records.into_iter().find(|r| r.id == id))
    }

    async fn update(&self, mut record: Record) -> ShelfResult<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;

        record.fields.remove("id");
        let slot = file
            .records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(ShelfError::RecordNotFound(record.id))?;
        *slot = record;

        self.write(&file).await
    }

    async fn delete(&self, id: u64) -> ShelfResult<bool> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;

        let before = file.records.len();
        file.records.retain(|r| r.id != id);
        if file.records.len() == before {
            return Ok(false);
        }

        self.write(&file).await?;
        Ok(true)
    }

    async fn get_all(&self) -> ShelfResult<Vec<Record>> {
        let mut records = self.read().await?.records;
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn crud_cycle() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::new(temp.path(), "users").unwrap();
        store.init().await.unwrap();

        let alice = store
            .add(fields(json!({"name": "Alice", "email": "alice@example.com"})))
            .await
            .unwrap();
        let bob = store.add(fields(json!({"name": "Bob"}))).await.unwrap();
        assert_eq!((alice, bob), (1, 2));

        let mut record = store.get(alice).await.unwrap().unwrap();
        assert_eq!(record.fields["name"], "Alice");

        record.fields.insert("name".to_string(), json!("Alice B."));
        store.update(record).await.unwrap();
        assert_eq!(
            store.get(alice).await.unwrap().unwrap().fields["name"],
            "Alice B."
        );

        assert!(store.delete(bob).await.unwrap());
        assert!(!store.delete(bob).await.unwrap());
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ids_are_not_reused() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::new(temp.path(), "notes").unwrap();
        store.init().await.unwrap();

        let first = store.add(Map::new()).await.unwrap();
        store.delete(first).await.unwrap();
        let second = store.add(Map::new()).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn update_missing_record_errors() {
        let temp = TempDir::new().unwrap();
        let store = FileRecordStore::new(temp.path(), "users").unwrap();
        store.init().await.unwrap();

        let err = store
            .update(Record {
                id: 42,
                fields: Map::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ShelfError::RecordNotFound(42)));
    }

    #[test]
    fn store_name_cannot_leave_records_dir() {
        let temp = TempDir::new().unwrap();
        for name in ["../../x", "a/b", "a\\b", "..", ""] {
            let err = FileRecordStore::new(temp.path(), name).err().unwrap();
            assert!(matches!(err, ShelfError::InvalidStoreName(_)), "{}", name);
        }

        let store = FileRecordStore::new(temp.path(), "user-notes_v2").unwrap();
        assert_eq!(store.path(), temp.path().join("user-notes_v2.json"));
    }

    #[test]
    fn record_flattens_fields() {
        let record = Record {
            id: 7,
            fields: fields(json!({"title": "x"})),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": 7, "title": "x"}));
    }
}
