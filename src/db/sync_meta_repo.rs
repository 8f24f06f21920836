//! Sync bookkeeping key/value storage.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Key under which the most recent successful sync time is stored.
pub const LAST_SYNC_KEY: &str = "last_sync";

pub struct SyncMetaRepository {
    pool: SqlitePool,
}

impl SyncMetaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT value FROM sync_meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sync_meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Time of the most recent successful sync, if any. A value that does
    /// not parse is treated as absent.
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let value = self.get(LAST_SYNC_KEY).await?;
        Ok(value.and_then(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }))
    }

    pub async fn set_last_sync(&self, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        self.set(LAST_SYNC_KEY, &at.to_rfc3339()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_store;
    use tempfile::TempDir;

    async fn setup() -> (SyncMetaRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir.path().join("replica.db")).await.unwrap();
        (store.sync_meta(), temp_dir)
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let (repo, _temp) = setup().await;
        assert!(repo.get("nope").await.unwrap().is_none());
        assert!(repo.last_sync().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let (repo, _temp) = setup().await;

        repo.set("k", "one").await.unwrap();
        repo.set("k", "two").await.unwrap();
        assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_last_sync_roundtrip() {
        let (repo, _temp) = setup().await;

        let at = DateTime::parse_from_rfc3339("2026-08-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        repo.set_last_sync(at).await.unwrap();
        assert_eq!(repo.last_sync().await.unwrap(), Some(at));
    }

    #[tokio::test]
    async fn test_unparseable_last_sync_is_none() {
        let (repo, _temp) = setup().await;

        repo.set(LAST_SYNC_KEY, "not a timestamp").await.unwrap();
        assert!(repo.last_sync().await.unwrap().is_none());
    }
}
