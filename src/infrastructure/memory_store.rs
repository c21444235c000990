// In-memory key-value store for tests and single-process deployments.

use crate::error::AppResult;
use crate::infrastructure::store::{KeyValueStore, StoreItem};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// BTreeMap-backed store. The (pk, sk) composite key keeps partitions
/// contiguous, so partition queries are range scans.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Arc<RwLock<BTreeMap<(String, String), StoreItem>>>,
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn is_live(item: &StoreItem) -> bool {
    match item.expires_at {
        Some(expires_at) => expires_at > now_epoch_secs(),
        None => true,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired rows. Reads already filter them out; this reclaims the
    /// memory, the way a managed store purges TTL'd items in the background.
    pub async fn purge_expired(&self) -> usize {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|_, item| is_live(item));
        before - items.len()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, item: StoreItem) -> AppResult<()> {
        let mut items = self.items.write().await;
        items.insert((item.pk.clone(), item.sk.clone()), item);
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> AppResult<Option<StoreItem>> {
        let items = self.items.read().await;
        Ok(items
            .get(&(pk.to_string(), sk.to_string()))
            .filter(|item| is_live(item))
            .cloned())
    }

    async fn query_partition(&self, pk: &str) -> AppResult<Vec<StoreItem>> {
        let items = self.items.read().await;
        let lower = (pk.to_string(), String::new());
        Ok(items
            .range(lower..)
            .take_while(|((item_pk, _), _)| item_pk == pk)
            .map(|(_, item)| item)
            .filter(|item| is_live(item))
            .cloned()
            .collect())
    }

    async fn delete(&self, pk: &str, sk: &str) -> AppResult<bool> {
        let mut items = self.items.write().await;
        Ok(items.remove(&(pk.to_string(), sk.to_string())).is_some())
    }

    async fn scan(&self) -> AppResult<Vec<StoreItem>> {
        let items = self.items.read().await;
        Ok(items.values().filter(|item| is_live(item)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::EntityKey;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        let key = EntityKey::UserInfo {
            user_id: "u1".into(),
        };
        let item = StoreItem::new(&key, serde_json::json!({"email": "a@b.c"}));
        store.put(item.clone()).await.unwrap();

        let fetched = store.get(&item.pk, &item.sk).await.unwrap();
        assert_eq!(fetched, Some(item.clone()));

        assert!(store.delete(&item.pk, &item.sk).await.unwrap());
        assert!(!store.delete(&item.pk, &item.sk).await.unwrap());
        assert_eq!(store.get(&item.pk, &item.sk).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_query_partition_is_prefix_exact() {
        let store = MemoryStore::new();
        for post_id in ["p1", "p2"] {
            let key = EntityKey::Post {
                user_id: "u1".into(),
                post_id: post_id.into(),
            };
            store.put(StoreItem::existence(&key)).await.unwrap();
        }
        // Same user, different partition - must not bleed into the post query.
        let pin = EntityKey::PinnedPost {
            user_id: "u1".into(),
            post_id: "p1".into(),
        };
        store.put(StoreItem::existence(&pin)).await.unwrap();

        let posts = store.query_partition("USER#u1#POST").await.unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_items_are_invisible() {
        let store = MemoryStore::new();
        let key = EntityKey::DailyPostMarker {
            user_id: "u1".into(),
            post_id: "p1".into(),
        };
        let expired = StoreItem::existence(&key).with_expiry(now_epoch_secs() - 10);
        let (pk, sk) = key.encode();
        store.put(expired).await.unwrap();

        assert_eq!(store.get(&pk, &sk).await.unwrap(), None);
        assert!(store.query_partition("USER#u1#DAILYPOST").await.unwrap().is_empty());
        assert!(store.scan().await.unwrap().is_empty());
        assert_eq!(store.purge_expired().await, 1);
    }
}
