//! Key/Value Storage Medium
//!
//! The persistent medium underneath the encrypted secure storage. It is a flat
//! string-to-string map, the same shape as browser `localStorage`:
//! - Desktop: a JSON file in the application data directory
//! - Mobile/Web: the webview's `localStorage`
//!
//! Values written here are already encrypted by `core-storage`; the medium
//! itself provides no confidentiality.

use async_trait::async_trait;

use crate::error::Result;

/// Flat string key/value medium
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// async fn wipe_prefixed(store: &dyn KeyValueStore, prefix: &str) -> Result<()> {
///     for key in store.keys().await? {
///         if key.starts_with(prefix) {
///             store.remove_item(&key).await?;
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value. Returns `Ok(None)` if the key does not exist.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value, replacing any previous one.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Deleting a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<()>;

    /// List every key currently held by the medium.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Check if a key exists without reading it
    async fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_item(key).await?.is_some())
    }
}
