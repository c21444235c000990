// Conformance of the SQLite store against the store contract.

use daybook::infrastructure::store::{KeyValueStore, StoreItem};
use daybook::infrastructure::SqliteStore;
use daybook::keyspace::EntityKey;

fn user_item(user_id: &str, email: &str) -> StoreItem {
    StoreItem::new(
        &EntityKey::UserInfo {
            user_id: user_id.into(),
        },
        serde_json::json!({"userId": user_id, "email": email}),
    )
}

#[tokio::test]
async fn test_put_get_roundtrip() {
    let store = SqliteStore::new_in_memory().await.unwrap();
    let item = user_item("u1", "a@b.c");
    store.put(item.clone()).await.unwrap();

    let fetched = store.get(&item.pk, &item.sk).await.unwrap();
    assert_eq!(fetched, Some(item));
}

#[tokio::test]
async fn test_put_overwrites_in_place() {
    let store = SqliteStore::new_in_memory().await.unwrap();
    store.put(user_item("u1", "old@b.c")).await.unwrap();
    store.put(user_item("u1", "new@b.c")).await.unwrap();

    let fetched = store.get("USER#u1", "INFO").await.unwrap().unwrap();
    assert_eq!(fetched.payload["email"], "new@b.c");
    assert_eq!(store.scan().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_query_partition_and_delete() {
    let store = SqliteStore::new_in_memory().await.unwrap();
    for post_id in ["p1", "p2", "p3"] {
        let key = EntityKey::Post {
            user_id: "u1".into(),
            post_id: post_id.into(),
        };
        store.put(StoreItem::existence(&key)).await.unwrap();
    }
    store
        .put(StoreItem::existence(&EntityKey::PinnedPost {
            user_id: "u1".into(),
            post_id: "p1".into(),
        }))
        .await
        .unwrap();

    assert_eq!(store.query_partition("USER#u1#POST").await.unwrap().len(), 3);

    assert!(store.delete("USER#u1#POST", "POST#p2").await.unwrap());
    assert!(!store.delete("USER#u1#POST", "POST#p2").await.unwrap());
    assert_eq!(store.query_partition("USER#u1#POST").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_expired_items_are_invisible() {
    let store = SqliteStore::new_in_memory().await.unwrap();
    let key = EntityKey::DailyPostMarker {
        user_id: "u1".into(),
        post_id: "p1".into(),
    };
    let (pk, sk) = key.encode();

    store.put(StoreItem::existence(&key).with_expiry(1)).await.unwrap();
    assert_eq!(store.get(&pk, &sk).await.unwrap(), None);
    assert!(store.query_partition("USER#u1#DAILYPOST").await.unwrap().is_empty());
    assert!(store.scan().await.unwrap().is_empty());

    // A live expiry is visible.
    let far_future = 4_102_444_800; // 2100-01-01
    store.put(StoreItem::existence(&key).with_expiry(far_future)).await.unwrap();
    assert!(store.get(&pk, &sk).await.unwrap().is_some());
}

#[tokio::test]
async fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("store.db").display());

    {
        let store = SqliteStore::connect(&url).await.unwrap();
        store.put(user_item("u1", "a@b.c")).await.unwrap();
    }

    let reopened = SqliteStore::connect(&url).await.unwrap();
    let fetched = reopened.get("USER#u1", "INFO").await.unwrap();
    assert!(fetched.is_some());
}
