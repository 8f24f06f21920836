//! Per-user list ordering storage.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::UserListPosition;

pub struct PositionRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct PositionRow {
    user_id: String,
    list_id: String,
    position: i64,
}

impl PositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upserts one ordering preference; unique per `(user_id, list_id)`.
    pub async fn set(&self, user_id: &str, list_id: Uuid, position: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_list_positions (user_id, list_id, position)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, list_id) DO UPDATE SET position = excluded.position
            "#,
        )
        .bind(user_id)
        .bind(list_id.to_string())
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, user_id: &str, list_id: Uuid) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT position FROM user_list_positions WHERE user_id = ? AND list_id = ?",
        )
        .bind(user_id)
        .bind(list_id.to_string())
        .fetch_optional(&self.pool)
        .await
    }

    /// All of one user's ordering preferences, lowest position first.
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<UserListPosition>, sqlx::Error> {
        let rows: Vec<PositionRow> = sqlx::query_as(
            "SELECT * FROM user_list_positions WHERE user_id = ? ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| UserListPosition {
                user_id: row.user_id,
                list_id: Uuid::parse_str(&row.list_id).unwrap_or_default(),
                position: row.position,
            })
            .collect())
    }
}
