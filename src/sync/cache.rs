use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::StoreError;
use super::store::KeyValueStore;

const CACHE_PREFIX: &str = "cache:get:";

/// 缓存的 GET 响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub body: Value,
    pub cached_at: DateTime<Utc>,
}

/// GET 响应缓存，键为完整的 endpoint（含查询串）
pub struct ResponseCache<S> {
    store: S,
}

pub fn cache_key(endpoint: &str) -> String {
    let digest = Sha256::digest(endpoint.as_bytes());
    format!("{}{:x}", CACHE_PREFIX, digest)
}

impl<S: KeyValueStore> ResponseCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn put(&self, endpoint: &str, body: &Value) -> Result<(), StoreError> {
        let entry = CachedResponse {
            body: body.clone(),
            cached_at: Utc::now(),
        };
        let json = serde_json::to_string(&entry).map_err(|e| StoreError::Corrupt {
            key: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(&cache_key(endpoint), json).await
    }

    /// 取出上一次成功的响应；记录损坏时当作没有缓存
    pub async fn get(&self, endpoint: &str) -> Result<Option<CachedResponse>, StoreError> {
        let Some(json) = self.store.get(&cache_key(endpoint)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!("Dropping unreadable cache entry for {}: {}", endpoint, e);
                self.store.remove(&cache_key(endpoint)).await?;
                Ok(None)
            }
        }
    }
}
