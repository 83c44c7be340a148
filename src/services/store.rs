//! Durable key/value storage backing the timer record

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::StoreError;

/// Synchronous key/value storage that stays usable during process teardown.
///
/// Reads never fail: a missing or unreadable key is simply absent. Writes
/// report failures, but callers in this crate treat them as fire-and-forget.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Write several keys as one unit.
    fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove several keys as one unit.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-memory store, mostly for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk.
///
/// The whole map is rewritten on every mutation through a temp file and a
/// rename, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing or corrupt file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => {
                    info!("Loaded {} stored keys from {}", map.len(), path.display());
                    map
                }
                Ok(_) => {
                    warn!("Store file {} is not a JSON object, starting empty", path.display());
                    Map::new()
                }
                Err(e) => {
                    warn!("Store file {} is unreadable ({}), starting empty", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No store file at {}, starting empty", path.display());
                Map::new()
            }
            Err(e) => {
                warn!("Failed to read store file {}: {}", path.display(), e);
                Map::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        // Held across the disk write so files land in mutation order.
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        apply(&mut entries);
        let encoded = serde_json::to_vec_pretty(&*entries)?;
        self.write_atomically(&encoded)
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl PersistentStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn set_many(&self, batch: Vec<(&str, Value)>) -> Result<(), StoreError> {
        self.mutate(|entries| {
            for (key, value) in batch {
                entries.insert(key.to_string(), value);
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.mutate(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_basic_operations() {
        let store = MemoryStore::new();
        assert!(!store.contains("k"));

        store.set("k", json!(3)).unwrap();
        assert_eq!(store.get("k"), Some(json!(3)));
        assert!(store.contains("k"));

        store.remove("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStore::open(&path);
        store
            .set_many(vec![("a", json!("x")), ("b", json!(1.5))])
            .unwrap();
        store.remove("a").unwrap();

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get("a"), None);
        assert_eq!(reopened.get("b"), Some(json!(1.5)));
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert!(!store.contains("anchor_instant"));

        store.set("k", json!(true)).unwrap();
        assert_eq!(JsonFileStore::open(&path).get("k"), Some(json!(true)));
    }

    #[test]
    fn concurrent_writers_leave_disk_matching_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::open(&path);

        std::thread::scope(|s| {
            for writer in 0..4 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..25 {
                        store.set(&format!("writer_{}", writer), json!(i)).unwrap();
                    }
                });
            }
        });

        let reopened = JsonFileStore::open(&path);
        for writer in 0..4 {
            let key = format!("writer_{}", writer);
            assert_eq!(reopened.get(&key), Some(json!(24)));
            assert_eq!(reopened.get(&key), store.get(&key));
        }
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("state.json");

        let store = JsonFileStore::open(&path);
        store.set("label", json!("no sugar")).unwrap();
        assert!(path.exists());
    }
}
