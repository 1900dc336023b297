//! Encrypted key/value storage over a host medium.
//!
//! ## Layout
//!
//! Every entry is stored under `<prefix><key>` where the prefix is
//! `_k2_<namespace>_` (`_k2_secure_` by default). The stored value is the
//! sealed JSON of a [`StorageEntry`]:
//!
//! ```text
//! { "value": <T>, "createdAt": 1718000000000, "expiry": 1718003600000 }
//! ```
//!
//! ## Failure model
//!
//! Entries that cannot be decoded, decrypted or parsed are deleted and read
//! as absent. Expired entries are deleted on read. Errors from the medium
//! itself are returned to the caller.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use bridge_traits::device::DeviceSignalSource;
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::{Clock, SystemClock};

use crate::cipher::{device_fingerprint, DeviceCipher};
use crate::error::{Result, StorageError};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "secure";

/// Persisted envelope around a stored value. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntry<T> {
    pub value: T,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

impl<T> StorageEntry<T> {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expiry.is_some_and(|expiry| now_millis > expiry)
    }
}

/// Encrypted storage with a device-derived key.
///
/// Clones and namespaced views share the derived key, which is computed on
/// first use and never again.
#[derive(Clone)]
pub struct SecureStorage {
    medium: Arc<dyn KeyValueStore>,
    signals: Arc<dyn DeviceSignalSource>,
    clock: Arc<dyn Clock>,
    cipher: Arc<OnceLock<DeviceCipher>>,
    prefix: String,
}

impl SecureStorage {
    pub fn new(medium: Arc<dyn KeyValueStore>, signals: Arc<dyn DeviceSignalSource>) -> Self {
        Self {
            medium,
            signals,
            clock: Arc::new(SystemClock),
            cipher: Arc::new(OnceLock::new()),
            prefix: prefix_for(DEFAULT_NAMESPACE),
        }
    }

    /// A view of the same medium isolated under `_k2_<namespace>_`.
    pub fn with_namespace(&self, namespace: &str) -> Self {
        Self {
            prefix: prefix_for(namespace),
            ..self.clone()
        }
    }

    /// Replace the time source used for `createdAt` and expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn cipher(&self) -> &DeviceCipher {
        self.cipher.get_or_init(|| {
            debug!("Deriving secure storage key");
            DeviceCipher::derive(&device_fingerprint(&self.signals.signals()))
        })
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Read a value. Missing, expired and corrupted entries return `Ok(None)`.
    #[instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let storage_key = self.storage_key(key);

        let Some(sealed) = self.medium.get_item(&storage_key).await? else {
            return Ok(None);
        };

        let entry = match self.decode_entry::<T>(&sealed) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Dropping unreadable secure storage entry");
                self.medium.remove_item(&storage_key).await?;
                return Ok(None);
            }
        };

        if entry.is_expired(self.clock.now_millis()) {
            debug!("Secure storage entry expired");
            self.medium.remove_item(&storage_key).await?;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    /// Store a value, optionally expiring after `ttl`. A zero `ttl` never expires.
    #[instrument(skip(self, value), fields(prefix = %self.prefix))]
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let now = self.clock.now_millis();
        let expiry = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)));

        let entry = StorageEntry {
            value,
            created_at: now,
            expiry,
        };

        let plaintext =
            serde_json::to_vec(&entry).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let sealed = self.cipher().seal(&plaintext)?;

        self.medium.set_item(&self.storage_key(key), &sealed).await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.medium.remove_item(&self.storage_key(key)).await?;
        Ok(())
    }

    /// `true` when [`get`](Self::get) would return a value.
    pub async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get::<serde_json::Value>(key).await?.is_some())
    }

    /// Remove every entry under this prefix. Other keys on the medium are untouched.
    #[instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn clear(&self) -> Result<()> {
        let mut removed = 0usize;
        for storage_key in self.medium.keys().await? {
            if storage_key.starts_with(&self.prefix) {
                self.medium.remove_item(&storage_key).await?;
                removed += 1;
            }
        }
        debug!(removed, "Cleared secure storage");
        Ok(())
    }

    /// Un-prefixed names of live, readable entries.
    ///
    /// Expired or corrupted entries found along the way are removed.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut live = Vec::new();
        for storage_key in self.medium.keys().await? {
            let Some(key) = storage_key.strip_prefix(&self.prefix) else {
                continue;
            };
            if self.has(key).await? {
                live.push(key.to_string());
            }
        }
        Ok(live)
    }

    fn decode_entry<T: DeserializeOwned>(&self, sealed: &str) -> Result<StorageEntry<T>> {
        let plaintext = self.cipher().open(sealed)?;
        serde_json::from_slice(&plaintext).map_err(|e| StorageError::Corrupted(e.to_string()))
    }
}

impl fmt::Debug for SecureStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureStorage")
            .field("prefix", &self.prefix)
            .field("key_derived", &self.cipher.get().is_some())
            .finish()
    }
}

fn prefix_for(namespace: &str) -> String {
    format!("_k2_{}_", namespace)
}
