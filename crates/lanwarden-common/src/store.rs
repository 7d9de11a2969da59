//! Key-value JSON persistence
//!
//! The core treats persistence as an injected load/save capability: device
//! inventories, uptime records, reputation maps, and schedules are serialized
//! as JSON blobs under string keys. Components that own state take a
//! `&dyn KvStore` and never know where the bytes land.

use lanwarden_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Injected persistence capability
pub trait KvStore: Send + Sync {
    /// Store a raw JSON blob under a key
    fn put_raw(&self, key: &str, value: &str) -> Result<()>;

    /// Fetch the raw JSON blob for a key, if present
    fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Remove a key; absent keys are not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Serialize and store any serde value
pub fn put<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    store.put_raw(key, &json)
}

/// Load and deserialize a serde value, `None` when the key is absent
pub fn get<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get_raw(key)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// In-memory store, used by tests and as a null persistence layer
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Store(String::from("memory store poisoned")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| Error::Store(String::from("memory store poisoned")))?;
        Ok(entries.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Store(String::from("memory store poisoned")))?;
        entries.remove(key);
        Ok(())
    }
}

/// File-backed store: one `<key>.json` file per key under a base directory
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys become file names; reject anything that could escape base_dir
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return Err(Error::Store(format!("invalid store key {:?}", key)));
        }
        Ok(self.base_dir.join(format!("{}.json", key)))
    }
}

impl KvStore for FileStore {
    fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        // Write-then-rename so a crash never leaves a half-written blob
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Stored {} bytes under key {:?}", value.len(), key);
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Well-known store keys used by the scanner
pub mod keys {
    pub const DEVICES: &str = "devices";
    pub const UPTIME: &str = "uptime";
    pub const REPUTATION: &str = "reputation";
    pub const SCHEDULES: &str = "schedules";
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

/// Convenience: check existence without deserializing
pub fn contains(store: &dyn KvStore, key: &str) -> Result<bool> {
    Ok(store.get_raw(key)?.is_some())
}
