use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::{KeyValueStore, StoreItem};

/// SQLite implementation of the key-value store.
///
/// One table keyed by (pk, sk); partition queries hit the primary key index.
/// Expiry is enforced in the WHERE clause of every read, matching the
/// "store purges automatically" contract of the memory implementation.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to SQLite: {}", e)))?;
        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_items (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                payload TEXT NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (pk, sk)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create kv_items table: {}", e)))?;
        Ok(())
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> AppResult<StoreItem> {
        let payload: String = row.get("payload");
        Ok(StoreItem {
            pk: row.get("pk"),
            sk: row.get("sk"),
            payload: serde_json::from_str(&payload)?,
            expires_at: row.get("expires_at"),
        })
    }

    fn now_epoch_secs() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn put(&self, item: StoreItem) -> AppResult<()> {
        let payload = serde_json::to_string(&item.payload)?;
        sqlx::query(
            r#"
            INSERT INTO kv_items (pk, sk, payload, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (pk, sk) DO UPDATE SET payload = excluded.payload,
                                               expires_at = excluded.expires_at
            "#,
        )
        .bind(&item.pk)
        .bind(&item.sk)
        .bind(&payload)
        .bind(item.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to put item: {}", e)))?;
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> AppResult<Option<StoreItem>> {
        let row = sqlx::query(
            r#"
            SELECT pk, sk, payload, expires_at FROM kv_items
            WHERE pk = ? AND sk = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(pk)
        .bind(sk)
        .bind(Self::now_epoch_secs())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to get item: {}", e)))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn query_partition(&self, pk: &str) -> AppResult<Vec<StoreItem>> {
        let rows = sqlx::query(
            r#"
            SELECT pk, sk, payload, expires_at FROM kv_items
            WHERE pk = ? AND (expires_at IS NULL OR expires_at > ?)
            ORDER BY sk
            "#,
        )
        .bind(pk)
        .bind(Self::now_epoch_secs())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to query partition: {}", e)))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn delete(&self, pk: &str, sk: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM kv_items WHERE pk = ? AND sk = ?")
            .bind(pk)
            .bind(sk)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete item: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self) -> AppResult<Vec<StoreItem>> {
        let rows = sqlx::query(
            r#"
            SELECT pk, sk, payload, expires_at FROM kv_items
            WHERE expires_at IS NULL OR expires_at > ?
            ORDER BY pk, sk
            "#,
        )
        .bind(Self::now_epoch_secs())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to scan items: {}", e)))?;

        rows.iter().map(Self::row_to_item).collect()
    }
}
