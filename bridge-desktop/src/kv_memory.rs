use async_trait::async_trait;
use bridge_traits::{error::Result, storage::KeyValueStore};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local medium. Nothing survives a restart; useful for ephemeral
/// sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.read().await.keys().cloned().collect())
    }
}
