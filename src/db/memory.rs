use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::KeyValueStore;

#[derive(Default)]
pub struct MemoryStore {
    strings: RwLock<HashMap<String, String>>,
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: &str, value: &str) {
        self.strings
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn hash_count(&self) -> usize {
        self.hashes.read().await.len()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.strings.read().await.get(key).cloned())
    }

    async fn hgetall(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
        Ok(self
            .hashes
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> anyhow::Result<()> {
        let mut hashes = self.hashes.write().await;
        let hash = hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}
