//! List queries.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{List, ListKind};

pub struct ListRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ListRow {
    id: String,
    title: String,
    kind: String,
    owner: String,
    is_shared: bool,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl ListRow {
    fn into_list(self) -> List {
        List {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            title: self.title,
            kind: ListKind::parse(&self.kind).unwrap_or(ListKind::Todo),
            owner: self.owner,
            is_shared: self.is_shared,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            deleted_at: self.deleted_at.as_deref().map(parse_timestamp),
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ListRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Non-deleted lists the user can see: their own plus shared ones.
    ///
    /// Sharing membership is enforced by the remote store; everything in
    /// the replica was already fetched under this user's identity, so the
    /// shared marker is sufficient locally. Ordered by title; the host
    /// applies per-user positions on top.
    pub async fn get_user_lists(&self, user_id: &str) -> Result<Vec<List>, sqlx::Error> {
        let rows: Vec<ListRow> = sqlx::query_as(
            "SELECT * FROM lists WHERE deleted_at IS NULL AND (owner = ? OR is_shared = 1) ORDER BY title",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ListRow::into_list).collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<List>, sqlx::Error> {
        let row: Option<ListRow> = sqlx::query_as("SELECT * FROM lists WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ListRow::into_list))
    }

    pub async fn insert(&self, list: &List) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO lists (id, title, kind, owner, is_shared, created_at, updated_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(list.id.to_string())
        .bind(&list.title)
        .bind(list.kind.as_str())
        .bind(&list.owner)
        .bind(list.is_shared)
        .bind(list.created_at.to_rfc3339())
        .bind(list.updated_at.to_rfc3339())
        .bind(list.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts `incoming` only when it is at least as new as the local
    /// record. Returns whether the record was applied.
    pub async fn merge_if_newer(&self, incoming: &List) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let local_updated_at: Option<String> =
            sqlx::query_scalar("SELECT updated_at FROM lists WHERE id = ?")
                .bind(incoming.id.to_string())
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(local) = local_updated_at {
            if incoming.updated_at <= parse_timestamp(&local) {
                tx.rollback().await?;
                return Ok(false);
            }
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO lists
                (id, title, kind, owner, is_shared, created_at, updated_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(incoming.id.to_string())
        .bind(&incoming.title)
        .bind(incoming.kind.as_str())
        .bind(&incoming.owner)
        .bind(incoming.is_shared)
        .bind(incoming.created_at.to_rfc3339())
        .bind(incoming.updated_at.to_rfc3339())
        .bind(incoming.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Removes a list row and all its items in one transaction. The remote
    /// store cascades independently; this is the local side of a realtime
    /// list deletion.
    pub async fn delete_cascade(&self, id: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM items WHERE list_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
