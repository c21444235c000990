// Entity store interface - single-item operations over the flat namespace
// No multi-item transaction primitive is assumed; cross-row invariants are
// maintained by the enforcement layer above this one.

use crate::error::AppResult;
use crate::keyspace::EntityKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One row in the key-value namespace.
///
/// `expires_at` is epoch seconds; an expired item is invisible to every read
/// and purged by the store implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    pub pk: String,
    pub sk: String,
    pub payload: serde_json::Value,
    pub expires_at: Option<i64>,
}

impl StoreItem {
    pub fn new(key: &EntityKey, payload: serde_json::Value) -> Self {
        let (pk, sk) = key.encode();
        Self {
            pk,
            sk,
            payload,
            expires_at: None,
        }
    }

    /// Pure existence row: the key is the fact.
    pub fn existence(key: &EntityKey) -> Self {
        Self::new(key, serde_json::json!({}))
    }

    pub fn with_expiry(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn key(&self) -> Option<EntityKey> {
        EntityKey::decode(&self.pk, &self.sk)
    }
}

/// Key-value store contract shared by both services.
///
/// `scan` is the O(n) fallback for lookups with no partition-key index
/// ("find post by id across all users"). It is a known scalability debt, not
/// a design goal, and callers front it with a lookup cache where they can.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, item: StoreItem) -> AppResult<()>;
    async fn get(&self, pk: &str, sk: &str) -> AppResult<Option<StoreItem>>;
    async fn query_partition(&self, pk: &str) -> AppResult<Vec<StoreItem>>;
    /// Returns whether an item existed under the key.
    async fn delete(&self, pk: &str, sk: &str) -> AppResult<bool>;
    async fn scan(&self) -> AppResult<Vec<StoreItem>>;
}
