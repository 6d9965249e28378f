pub mod memory;
pub mod prospects;
pub mod upstash;

use std::collections::HashMap;

use async_trait::async_trait;

/// The small slice of Redis the agent needs: plain string reads for profile
/// config, and hash reads/writes for prospect records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Returns an empty map when the hash does not exist.
    async fn hgetall(&self, key: &str) -> anyhow::Result<HashMap<String, String>>;

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("prospect {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}
