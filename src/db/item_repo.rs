//! Item queries and the local-mutation entry point.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Item, ItemPatch};

pub struct ItemRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    list_id: String,
    text: String,
    is_checked: bool,
    quantity: Option<String>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
    pending: bool,
}

impl ItemRow {
    fn into_item(self) -> Item {
        Item {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            list_id: Uuid::parse_str(&self.list_id).unwrap_or_default(),
            text: self.text,
            is_checked: self.is_checked,
            quantity: self.quantity,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            deleted_at: self.deleted_at.as_deref().map(parse_timestamp),
            pending: self.pending,
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Non-deleted items of a list, unchecked first, then by text.
    pub async fn get_list_items(&self, list_id: Uuid) -> Result<Vec<Item>, sqlx::Error> {
        let rows: Vec<ItemRow> =
            sqlx::query_as("SELECT * FROM items WHERE list_id = ? AND deleted_at IS NULL")
                .bind(list_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut items: Vec<Item> = rows.into_iter().map(ItemRow::into_item).collect();
        items.sort_by(|a, b| {
            a.is_checked
                .cmp(&b.is_checked)
                .then_with(|| a.text.cmp(&b.text))
        });
        Ok(items)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Item>, sqlx::Error> {
        let row: Option<ItemRow> = sqlx::query_as("SELECT * FROM items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ItemRow::into_item))
    }

    /// Items with unconfirmed local edits. Soft-deleted items are included:
    /// a pending delete still has to reach the remote store.
    pub async fn get_pending(&self) -> Result<Vec<Item>, sqlx::Error> {
        let rows: Vec<ItemRow> =
            sqlx::query_as("SELECT * FROM items WHERE pending = 1 ORDER BY updated_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }

    pub async fn pending_count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE pending = 1")
            .fetch_one(&self.pool)
            .await
    }

    /// Inserts a locally-created item as-is.
    pub async fn insert(&self, item: &Item) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO items (id, list_id, text, is_checked, quantity, created_at, updated_at, deleted_at, pending)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.list_id.to_string())
        .bind(&item.text)
        .bind(item.is_checked)
        .bind(&item.quantity)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .bind(item.deleted_at.map(|dt| dt.to_rfc3339()))
        .bind(item.pending)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The only sanctioned local-mutation entry point: applies the patch,
    /// stamps `updated_at` with the current time and marks the item
    /// pending, all in one transaction.
    ///
    /// Fails with `RowNotFound` when the item does not exist; a missing
    /// mutation target is a contract violation, not an empty result.
    pub async fn update_with_pending(&self, id: Uuid, patch: ItemPatch) -> Result<Item, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row: Option<ItemRow> = sqlx::query_as("SELECT * FROM items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let mut item = row.ok_or(sqlx::Error::RowNotFound)?.into_item();

        if let Some(text) = patch.text {
            item.text = text;
        }
        if let Some(is_checked) = patch.is_checked {
            item.is_checked = is_checked;
        }
        if let Some(quantity) = patch.quantity {
            item.quantity = Some(quantity);
        }
        if let Some(deleted_at) = patch.deleted_at {
            item.deleted_at = Some(deleted_at);
        }
        item.updated_at = Utc::now();
        item.pending = true;

        sqlx::query(
            r#"
            UPDATE items
            SET text = ?, is_checked = ?, quantity = ?, updated_at = ?, deleted_at = ?, pending = 1
            WHERE id = ?
            "#,
        )
        .bind(&item.text)
        .bind(item.is_checked)
        .bind(&item.quantity)
        .bind(item.updated_at.to_rfc3339())
        .bind(item.deleted_at.map(|dt| dt.to_rfc3339()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Clears the pending flag without touching any other field. Used when
    /// the remote store accepts a pushed record: the local version is now
    /// canonical.
    pub async fn clear_pending(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE items SET pending = 0 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replaces the whole local record with `item`, pending cleared. Used
    /// when the remote store rejects a push: the local edit is discarded in
    /// favor of the newer remote version.
    pub async fn overwrite(&self, item: &Item) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO items
                (id, list_id, text, is_checked, quantity, created_at, updated_at, deleted_at, pending)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.list_id.to_string())
        .bind(&item.text)
        .bind(item.is_checked)
        .bind(&item.quantity)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .bind(item.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts `incoming` only when it is at least as new as the local
    /// record, comparing `updated_at`. Never sets pending. Returns whether
    /// the record was applied.
    pub async fn merge_if_newer(&self, incoming: &Item) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let local_updated_at: Option<String> =
            sqlx::query_scalar("SELECT updated_at FROM items WHERE id = ?")
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
            INSERT OR REPLACE INTO items
                (id, list_id, text, is_checked, quantity, created_at, updated_at, deleted_at, pending)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(incoming.id.to_string())
        .bind(incoming.list_id.to_string())
        .bind(&incoming.text)
        .bind(incoming.is_checked)
        .bind(&incoming.quantity)
        .bind(incoming.created_at.to_rfc3339())
        .bind(incoming.updated_at.to_rfc3339())
        .bind(incoming.deleted_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Physically removes an item row. Only the realtime feed uses this;
    /// local deletion is logical via `deleted_at`.
    pub async fn delete_row(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
