//! Key-value persistence with a TTL layer.
//!
//! `FileStore` keeps everything in one JSON file (default
//! `~/.propnet/cache.json`); `MemoryStore` is for tests and offline use.
//! `TtlCache` stamps each value with its write time and treats entries
//! older than the TTL as missing, while still letting callers read the
//! stale copy when nothing fresher can be had.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Injected persistence capability. Values are opaque JSON strings.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// Single JSON file, rewritten on every change. Write failures are logged
/// and otherwise ignored: the cache is an optimisation.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self { path, entries: Mutex::new(entries) }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".propnet")
            .join("cache.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(path: &Path) -> Option<HashMap<String, String>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let written = serde_json::to_string_pretty(entries)
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(&self.path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            tracing::warn!(path = %self.path.display(), error = %e, "could not write cache file");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
            self.persist(&entries);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.remove(key).is_some() {
                self.persist(&entries);
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Stamped<T> {
    data: T,
    /// Unix millis at write time.
    timestamp: i64,
}

/// A cached value together with its freshness.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub value: T,
    pub fresh: bool,
}

/// Timestamped JSON values over any `KeyValueStore`.
#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Fresh value only. Expired entries are evicted.
    pub fn get<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let hit = self.get_any::<T>(key, ttl)?;
        if hit.fresh {
            Some(hit.value)
        } else {
            self.store.remove(key);
            None
        }
    }

    /// Value regardless of age, with its freshness.
    pub fn get_any<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<CacheHit<T>> {
        let raw = self.store.get(key)?;
        let stamped: Stamped<T> = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(key, error = %e, "dropping unreadable cache entry");
                self.store.remove(key);
                return None;
            }
        };
        let age = chrono::Utc::now().timestamp_millis() - stamped.timestamp;
        let fresh = age < ttl.as_millis() as i64;
        Some(CacheHit { value: stamped.data, fresh })
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        self.put_at(key, value, chrono::Utc::now().timestamp_millis());
    }

    fn put_at<T: Serialize>(&self, key: &str, value: &T, timestamp: i64) {
        match serde_json::to_string(&Stamped { data: value, timestamp }) {
            Ok(json) => self.store.set(key, json),
            Err(e) => tracing::warn!(key, error = %e, "could not serialise cache entry"),
        }
    }

    pub fn remove(&self, key: &str) {
        self.store.remove(key);
    }
}
