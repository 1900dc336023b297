//! JSON-file key/value medium.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const APP_DIR: &str = "k2";
const FILE_NAME: &str = "storage.json";

/// Flat string map persisted as one JSON object.
///
/// The file is loaded lazily on first access and rewritten on every
/// mutation through a temporary file and a rename, so a crash never leaves a
/// half-written map behind. A failed write leaves the in-memory view
/// untouched. A corrupt file is treated as empty.
pub struct FileKeyValueStore {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// `<data dir>/k2/storage.json`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir().ok_or_else(|| {
            BridgeError::NotAvailable("No application data directory".to_string())
        })?;
        Ok(Self::new(dir.join(APP_DIR).join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => Ok(map),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Discarding unreadable storage file"
                    );
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(map).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to encode storage: {}", e))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), entries = map.len(), "Storage file written");
        Ok(())
    }

    async fn with_map<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> Result<T> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let Some(current) = guard.as_ref() else {
            return Err(BridgeError::OperationFailed("Storage not loaded".to_string()));
        };

        // The cached map only changes once the file holds the new contents.
        let mut next = current.clone();
        let (value, dirty) = f(&mut next);
        if dirty {
            self.persist(&next).await?;
            *guard = Some(next);
        }
        Ok(value)
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.with_map(|map| (map.get(key).cloned(), false)).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.with_map(|map| {
            let changed = map.get(key).map(String::as_str) != Some(value);
            if changed {
                map.insert(key.to_string(), value.to_string());
            }
            ((), changed)
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.with_map(|map| ((), map.remove(key).is_some())).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.with_map(|map| (map.keys().cloned().collect(), false)).await
    }
}
