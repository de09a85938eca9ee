//! Key-value store backends.
//!
//! Two backends are available:
//!   - **JSON file**: loads entirely into memory, flushed atomically via temp+rename.
//!   - **Memory**: process-local map, nothing persisted.
//!
//! Both implement `KeyValueStore`. Writes go through a `WriteBatch` which is
//! applied all-or-nothing, so a caller can set one key and clear another in
//! a single step.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{StorageError, StorageResult};

/// A single mutation inside a `WriteBatch`
#[derive(Debug, Clone, PartialEq)]
enum WriteOp {
    Set(String, Value),
    Remove(String),
}

/// Ordered set of mutations applied atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.ops.push(WriteOp::Set(key.to_string(), value));
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.ops.push(WriteOp::Remove(key.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn apply_to(self, map: &mut Map<String, Value>) {
        for op in self.ops {
            match op {
                WriteOp::Set(key, Value::Null) | WriteOp::Remove(key) => {
                    map.remove(&key);
                }
                WriteOp::Set(key, value) => {
                    map.insert(key, value);
                }
            }
        }
    }
}

/// Durable string-keyed JSON store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Missing keys and JSON `null` both return `None`.
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Apply every op in `batch`, or none of them.
    fn apply(&self, batch: WriteBatch) -> StorageResult<()>;

    fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.apply(WriteBatch::new().set(key, value))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.apply(WriteBatch::new().remove(key))
    }
}

fn lock(entries: &Mutex<Map<String, Value>>) -> StorageResult<MutexGuard<'_, Map<String, Value>>> {
    entries.lock().map_err(|_| StorageError::Poisoned)
}

fn lookup(map: &Map<String, Value>, key: &str) -> Option<Value> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(lookup(&*lock(&self.entries)?, key))
    }

    fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        batch.apply_to(&mut *lock(&self.entries)?);
        Ok(())
    }
}

/// JSON-file-backed store
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Load or create a store at the given path.
    /// If the file doesn't exist, starts empty; nothing is written until the
    /// first mutation.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let entries: Map<String, Value> = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
                op: "reading store",
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Map::new()
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "opened store");

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Write `map` to disk using an atomic write (write then rename).
    fn flush(&self, map: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                op: "creating store dir",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(map)?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json).map_err(|source| StorageError::Io {
            op: "writing store temp",
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| StorageError::Io {
            op: "renaming store",
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(lookup(&*lock(&self.entries)?, key))
    }

    fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut guard = lock(&self.entries)?;
        // Mutate a copy so a failed flush leaves memory and disk in agreement.
        let mut next = guard.clone();
        batch.apply_to(&mut next);
        self.flush(&next)?;
        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_memory_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", json!(1)).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(json!(1)));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_null_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("a", json!("x")).unwrap();
        store.set("a", Value::Null).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_batch_applies_in_order() {
        let store = MemoryStore::new();
        store.set("plain", json!("sk-old")).unwrap();

        store
            .apply(
                WriteBatch::new()
                    .set("enc", json!({"k": 1}))
                    .remove("plain"),
            )
            .unwrap();

        assert_eq!(store.get("plain").unwrap(), None);
        assert_eq!(store.get("enc").unwrap(), Some(json!({"k": 1})));
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/storage.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("selectedModel", json!("o1")).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("selectedModel").unwrap(), Some(json!("o1")));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_store_missing_file_is_empty_and_unwritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storage.json");

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileStore::open(&path);
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_file_store_failed_flush_keeps_previous_state() {
        let tmp = TempDir::new().unwrap();
        // Parent "dir" is a regular file, so create_dir_all fails.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = JsonFileStore::open(&blocker.join("storage.json")).unwrap();

        let result = store.set("a", json!(1));
        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(store.get("a").unwrap(), None);
    }
}
