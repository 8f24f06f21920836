//! Append-only storage for the check statistics stream.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::CheckLog;

pub struct CheckLogRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CheckLogRow {
    id: String,
    user_id: String,
    list_name: String,
    item_name: String,
    checked_at: String,
    list_id: Option<String>,
    item_id: Option<String>,
    pending: bool,
}

impl CheckLogRow {
    fn into_check_log(self) -> CheckLog {
        CheckLog {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            user_id: self.user_id,
            list_name: self.list_name,
            item_name: self.item_name,
            checked_at: parse_timestamp(&self.checked_at),
            list_id: self.list_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
            item_id: self.item_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()),
            pending: self.pending,
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl CheckLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends one entry. Entries are never updated or deleted.
    pub async fn append(&self, entry: &CheckLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO check_logs (id, user_id, list_name, item_name, checked_at, list_id, item_id, pending)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.user_id)
        .bind(&entry.list_name)
        .bind(&entry.item_name)
        .bind(entry.checked_at.to_rfc3339())
        .bind(entry.list_id.map(|id| id.to_string()))
        .bind(entry.item_id.map(|id| id.to_string()))
        .bind(entry.pending)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Entries not yet acknowledged by the remote store, oldest first.
    pub async fn pending(&self) -> Result<Vec<CheckLog>, sqlx::Error> {
        let rows: Vec<CheckLogRow> =
            sqlx::query_as("SELECT * FROM check_logs WHERE pending = 1 ORDER BY checked_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(CheckLogRow::into_check_log).collect())
    }

    /// Clears pending on the given entries after the remote acknowledges
    /// the upload.
    pub async fn mark_acknowledged(&self, ids: &[Uuid]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for id in ids {
            sqlx::query("UPDATE check_logs SET pending = 0 WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
