//! Durable record store
//!
//! Key-ordered byte storage scoped to one instance database. Values are
//! opaque bytes; callers pick the encoding.

use crate::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

const CREATE_RECORDS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _hearth_records (
        key TEXT PRIMARY KEY NOT NULL,
        value BLOB NOT NULL,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    ) WITHOUT ROWID;
"#;

/// Strongly consistent get/put over a single instance's keyspace
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Durably store `value` under `key`; returns once the write is committed
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// [`RecordStore`] backed by a table in the instance's SQLite database
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open the store, creating its table if needed
    pub async fn open(pool: SqlitePool) -> Result<Self> {
        sqlx::raw_sql(CREATE_RECORDS_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }
}

const UPSERT: &str = r#"
    INSERT INTO _hearth_records (key, value, updated_at)
    VALUES (?, ?, CURRENT_TIMESTAMP)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = CURRENT_TIMESTAMP
"#;

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM _hearth_records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn create_store() -> SqliteRecordStore {
        let db = Database::in_memory().await.expect("Failed to create database");
        SqliteRecordStore::open(db.pool().clone())
            .await
            .expect("Failed to open record store")
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = create_store().await;
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = create_store().await;

        store.put("value", b"1").await.unwrap();
        store.put("value", b"2").await.unwrap();

        assert_eq!(store.get("value").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = create_store().await;
        store.put("a", b"1").await.unwrap();
        store.put("b", b"2").await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let first = SqliteRecordStore::open(db.pool().clone()).await.unwrap();
        first.put("kept", b"yes").await.unwrap();

        let second = SqliteRecordStore::open(db.pool().clone()).await.unwrap();
        assert_eq!(second.get("kept").await.unwrap(), Some(b"yes".to_vec()));
    }
}
