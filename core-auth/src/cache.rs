//! Response cache for cloud API reads.
//!
//! Two layers: an in-process map in front of [`SecureStorage`]. Entries carry
//! their own expiry so an expired entry can still be served as a fallback
//! when the network is down; storage-level expiry is never used.
//!
//! The cache holds account data. It is cleared whenever the session ends
//! (logout, or the 401 interceptor demoting the session) and on login.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use bridge_traits::time::{Clock, SystemClock};
use core_storage::SecureStorage;

/// Key of the cached profile read.
pub const USER_INFO_CACHE_KEY: &str = "api:user_info";

/// How a single read uses the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub key: String,
    /// `None` never expires.
    pub ttl: Option<Duration>,
    /// Serve an expired entry when the request fails in transport.
    pub allow_expired: bool,
    /// On a hit, answer from the cache and refresh the entry in the background.
    pub revalidate: bool,
    /// Skip the lookup and always go to the network.
    pub force_refresh: bool,
}

impl CachePolicy {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: None,
            allow_expired: false,
            revalidate: false,
            force_refresh: false,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn allow_expired(mut self) -> Self {
        self.allow_expired = true;
        self
    }

    pub fn revalidate(mut self) -> Self {
        self.revalidate = true;
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Cached payload. `expireAt` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
}

impl CacheEntry {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expire_at.is_some_and(|at| now_millis > at)
    }
}

#[derive(Clone)]
pub struct ResponseCache {
    memory: Arc<Mutex<HashMap<String, CacheEntry>>>,
    storage: SecureStorage,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Persist entries through `storage`. Give it a namespace of its own:
    /// [`clear`](Self::clear) wipes everything under that prefix.
    pub fn new(storage: SecureStorage) -> Self {
        Self {
            memory: Arc::new(Mutex::new(HashMap::new())),
            storage,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Store `data`. Persistence failures are logged; the memory layer still
    /// holds the entry.
    pub async fn set(&self, key: &str, data: Value, ttl: Option<Duration>) {
        let expire_at = ttl.map(|ttl| {
            let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            self.clock.now_millis().saturating_add(ttl)
        });
        let entry = CacheEntry { data, expire_at };

        if let Err(e) = self.storage.set(key, &entry, None).await {
            warn!(key, error = %e, "Persisting cache entry failed");
        }
        self.memory.lock().await.insert(key.to_string(), entry);
    }

    /// Entry with its metadata, expired or not.
    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.memory.lock().await.get(key) {
            return Some(entry.clone());
        }

        match self.storage.get::<CacheEntry>(key).await {
            Ok(Some(entry)) => {
                self.memory
                    .lock()
                    .await
                    .insert(key.to_string(), entry.clone());
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Reading cache entry failed");
                None
            }
        }
    }

    /// Cached data. Expired entries are returned only with `allow_expired`.
    pub async fn get(&self, key: &str, allow_expired: bool) -> Option<Value> {
        let entry = self.entry(key).await?;
        if entry.is_expired(self.clock.now_millis()) {
            if !allow_expired {
                return None;
            }
            debug!(key, "Serving expired cache entry");
        }
        Some(entry.data)
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get(key, false).await.is_some()
    }

    /// `true` for missing entries too.
    pub async fn is_expired(&self, key: &str) -> bool {
        match self.entry(key).await {
            Some(entry) => entry.is_expired(self.clock.now_millis()),
            None => true,
        }
    }

    pub async fn remove(&self, key: &str) {
        self.memory.lock().await.remove(key);
        if let Err(e) = self.storage.remove(key).await {
            warn!(key, error = %e, "Removing cache entry failed");
        }
    }

    pub async fn clear(&self) {
        self.memory.lock().await.clear();
        if let Err(e) = self.storage.clear().await {
            warn!(error = %e, "Clearing persisted cache failed");
        }
        debug!("Response cache cleared");
    }

    /// Drop expired entries from both layers.
    pub async fn clear_expired(&self) {
        let now = self.clock.now_millis();
        self.memory
            .lock()
            .await
            .retain(|_, entry| !entry.is_expired(now));

        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Listing cache entries failed");
                return;
            }
        };
        for key in keys {
            let expired = match self.storage.get::<CacheEntry>(&key).await {
                Ok(Some(entry)) => entry.is_expired(now),
                Ok(None) => false,
                Err(_) => true,
            };
            if expired {
                if let Err(e) = self.storage.remove(&key).await {
                    warn!(key, error = %e, "Removing expired cache entry failed");
                }
            }
        }
    }
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("prefix", &self.storage.prefix())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_storage, ManualClock};
    use serde_json::json;

    fn cache_with_clock() -> (ResponseCache, Arc<ManualClock>, SecureStorage) {
        let clock = Arc::new(ManualClock::new());
        let storage = memory_storage().with_namespace("cache");
        let cache = ResponseCache::new(storage.clone()).with_clock(clock.clone());
        (cache, clock, storage)
    }

    #[tokio::test]
    async fn test_expired_entries_only_serve_as_fallback() {
        let (cache, clock, _storage) = cache_with_clock();
        cache
            .set("api:plans", json!(["monthly"]), Some(Duration::from_secs(60)))
            .await;

        assert_eq!(cache.get("api:plans", false).await, Some(json!(["monthly"])));
        assert!(!cache.is_expired("api:plans").await);

        clock.advance(Duration::from_secs(61));

        assert!(cache.get("api:plans", false).await.is_none());
        assert!(cache.is_expired("api:plans").await);
        assert_eq!(cache.get("api:plans", true).await, Some(json!(["monthly"])));
        assert!(cache.is_expired("api:missing").await);
    }

    #[tokio::test]
    async fn test_entries_survive_a_new_instance() {
        let (cache, clock, storage) = cache_with_clock();
        cache.set(USER_INFO_CACHE_KEY, json!({"id": 3}), None).await;

        let reopened = ResponseCache::new(storage).with_clock(clock);
        let entry = reopened.entry(USER_INFO_CACHE_KEY).await.unwrap();

        assert_eq!(entry.data, json!({"id": 3}));
        assert_eq!(entry.expire_at, None);
        assert!(reopened.has(USER_INFO_CACHE_KEY).await);
    }

    #[tokio::test]
    async fn test_clear_and_clear_expired() {
        let (cache, clock, storage) = cache_with_clock();
        cache.set("short", json!(1), Some(Duration::from_secs(1))).await;
        cache.set("long", json!(2), Some(Duration::from_secs(3600))).await;
        cache.set("forever", json!(3), None).await;

        clock.advance(Duration::from_secs(5));
        cache.clear_expired().await;

        let mut keys = storage.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["forever".to_string(), "long".to_string()]);
        assert!(cache.entry("short").await.is_none());

        cache.remove("long").await;
        assert!(!cache.has("long").await);

        cache.clear().await;
        assert!(storage.keys().await.unwrap().is_empty());
        assert!(cache.get("forever", true).await.is_none());
    }
}
