// gitvault-core/src/cache/authority_cache.rs
//
// Persisted organization -> authentication authority cache, used to avoid
// a network round trip for tenant resolution on every invocation.
//
// The backing file is shared by independent helper processes with no
// locking, so the cache never trusts its in-memory copy: the read path
// reloads from persisted storage before every hit or miss, and mutations
// reload before applying (so an update here cannot clobber a concurrent
// update to an unrelated key). Writes replace the whole file atomically.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use gitvault_common::error::Error;

/// A flat string map with external persistence. Keys are case-insensitive
/// (normalized to lowercase).
pub trait TextMapStore: Send {
    /// Refresh the in-memory view from persisted storage.
    fn reload(&mut self) -> Result<(), Error>;
    /// Write the in-memory view back to persisted storage.
    fn commit(&mut self) -> Result<(), Error>;

    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str) -> bool;
    fn clear(&mut self);
}

/// JSON-file-backed implementation. A malformed file is treated as an
/// empty cache (the cache is a pure optimization with a well-defined miss
/// path), with a warning.
pub struct JsonFileStore {
    path: PathBuf,
    map: HashMap<String, String>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            map: HashMap::new(),
        }
    }
}

impl TextMapStore for JsonFileStore {
    fn reload(&mut self) -> Result<(), Error> {
        self.map = match std::fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str::<HashMap<String, String>>(&text) {
                Ok(map) => map
                    .into_iter()
                    .map(|(k, v)| (k.to_lowercase(), v))
                    .collect(),
                Err(err) => {
                    warn!("cache file {:?} is malformed ({}); treating as empty", self.path, err);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        let parent = self
            .path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent)?;
        let json = serde_json::to_string_pretty(&self.map)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Store(format!("failed to persist cache file: {}", e)))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.map.get(&key.to_lowercase()).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_lowercase(), value.to_string());
    }

    fn remove(&mut self, key: &str) -> bool {
        self.map.remove(&key.to_lowercase()).is_some()
    }

    fn clear(&mut self) {
        self.map.clear();
    }
}

/// Organization authority cache over any [`TextMapStore`].
pub struct AuthorityCache {
    store: Mutex<Box<dyn TextMapStore>>,
}

impl AuthorityCache {
    pub fn new(store: Box<dyn TextMapStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn key(org: &str) -> String {
        format!("org.{}.authority", org.to_lowercase())
    }

    pub async fn get_authority(&self, org: &str) -> Result<Option<String>, Error> {
        let mut store = self.store.lock().await;
        store.reload()?;
        let authority = store.get(&Self::key(org));
        debug!(org, authority = authority.as_deref().unwrap_or("<none>"), "authority cache lookup");
        Ok(authority)
    }

    pub async fn update_authority(&self, org: &str, authority: &str) -> Result<(), Error> {
        let mut store = self.store.lock().await;
        store.reload()?;
        store.set(&Self::key(org), authority);
        store.commit()
    }

    /// Removing an absent key is a no-op that leaves every other entry
    /// untouched.
    pub async fn erase_authority(&self, org: &str) -> Result<(), Error> {
        let mut store = self.store.lock().await;
        store.reload()?;
        if store.remove(&Self::key(org)) {
            store.commit()?;
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), Error> {
        let mut store = self.store.lock().await;
        store.reload()?;
        store.clear();
        store.commit()
    }
}
