//! Replica store: local SQLite persistence for lists, items, positions,
//! sync metadata and the check log.
//!
//! All access goes through [`ReplicaStore`] and the per-entity repositories
//! it hands out. Cross-table operations (`clear_all`, `replace_all`) run in
//! a single transaction so partial state is never observable.

mod check_log_repo;
mod item_repo;
mod list_repo;
mod position_repo;
pub(crate) mod schema;
mod sync_meta_repo;

pub use check_log_repo::CheckLogRepository;
pub use item_repo::ItemRepository;
pub use list_repo::ListRepository;
pub use position_repo::PositionRepository;
pub use schema::LATEST_VERSION;
pub use sync_meta_repo::SyncMetaRepository;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use crate::models::{Item, List};

/// Errors raised while opening or upgrading the replica store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store schema version {found} is newer than supported version {supported}")]
    Incompatible { found: i64, supported: i64 },

    #[error("failed to manage store files: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to the local replica database.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ReplicaStore {
    pool: SqlitePool,
}

/// One list with its items and the user's position, as materialized by a
/// full fetch from the remote store.
#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pub list: List,
    /// Server-side ordering preference; absent when the user has never
    /// ordered this list.
    pub position: Option<i64>,
    pub items: Vec<Item>,
}

pub(crate) async fn connect(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Opens (or creates) the replica store at `path` and runs schema upgrades.
pub async fn open_store(path: &Path) -> Result<ReplicaStore, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = connect(path).await?;

    if let Err(e) = schema::run_upgrades(&pool).await {
        pool.close().await;
        return Err(e);
    }

    Ok(ReplicaStore { pool })
}

/// Opens the store, recreating it from scratch when the on-disk schema is
/// incompatible with this client version.
///
/// This is the first store access after a client update; nothing else may
/// touch the store before it runs. The recreated store is empty and relies
/// on the next full sync to repopulate.
pub async fn open_store_with_recovery(path: &Path) -> Result<ReplicaStore, StoreError> {
    match open_store(path).await {
        Ok(store) => Ok(store),
        Err(StoreError::Incompatible { found, supported }) => {
            tracing::warn!(
                found,
                supported,
                "replica store schema is incompatible, recreating"
            );
            remove_store_files(path)?;
            open_store(path).await
        }
        Err(e) => Err(e),
    }
}

fn remove_store_files(path: &Path) -> std::io::Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let target = PathBuf::from(format!("{}{}", path.display(), suffix));
        match std::fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl ReplicaStore {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn lists(&self) -> ListRepository {
        ListRepository::new(self.pool.clone())
    }

    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone())
    }

    pub fn positions(&self) -> PositionRepository {
        PositionRepository::new(self.pool.clone())
    }

    pub fn sync_meta(&self) -> SyncMetaRepository {
        SyncMetaRepository::new(self.pool.clone())
    }

    pub fn check_logs(&self) -> CheckLogRepository {
        CheckLogRepository::new(self.pool.clone())
    }

    /// Empties every table in one transaction. Used for logout and forced
    /// cache invalidation.
    pub async fn clear_all(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for table in [
            "items",
            "lists",
            "user_list_positions",
            "check_logs",
            "sync_meta",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Replaces the replica's lists, items and positions with `snapshots`
    /// in one transaction.
    ///
    /// Any list absent from `snapshots` disappears locally, whatever the
    /// reason it is gone remotely (deleted, unshared, access revoked).
    /// Items are stored with `pending` cleared: the fetched dataset is the
    /// confirmed remote state. Lists without a server-supplied position get
    /// a monotonically increasing fallback.
    pub async fn replace_all(
        &self,
        user_id: &str,
        snapshots: &[ListSnapshot],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM items").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM lists").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM user_list_positions")
            .execute(&mut *tx)
            .await?;

        for (index, snapshot) in snapshots.iter().enumerate() {
            insert_list(&mut tx, &snapshot.list).await?;

            let position = snapshot.position.unwrap_or(index as i64);
            sqlx::query(
                "INSERT INTO user_list_positions (user_id, list_id, position) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(snapshot.list.id.to_string())
            .bind(position)
            .execute(&mut *tx)
            .await?;

            for item in &snapshot.items {
                insert_item(&mut tx, item).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_list(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    list: &List,
) -> Result<(), sqlx::Error> {
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
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item: &Item,
) -> Result<(), sqlx::Error> {
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
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, List, ListKind};
    use tempfile::TempDir;

    async fn test_store() -> (ReplicaStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir.path().join("replica.db")).await.unwrap();
        (store, temp_dir)
    }

    fn snapshot(list: List, items: Vec<Item>) -> ListSnapshot {
        ListSnapshot {
            list,
            position: None,
            items,
        }
    }

    #[tokio::test]
    async fn test_open_store_creates_tables() {
        let (store, _temp) = test_store().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(store.pool())
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(table_names.contains(&"lists"));
        assert!(table_names.contains(&"items"));
        assert!(table_names.contains(&"user_list_positions"));
        assert!(table_names.contains(&"sync_meta"));
        assert!(table_names.contains(&"check_logs"));
    }

    #[tokio::test]
    async fn test_clear_all_empties_every_table() {
        let (store, _temp) = test_store().await;

        let list = List::new("Groceries", ListKind::Shopping, "user-1");
        let item = Item::new(list.id, "milk");
        store
            .replace_all("user-1", &[snapshot(list, vec![item])])
            .await
            .unwrap();
        store.sync_meta().set("last_sync", "2026-01-01T00:00:00Z").await.unwrap();

        store.clear_all().await.unwrap();

        for table in ["lists", "items", "user_list_positions", "sync_meta", "check_logs"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(store.pool())
                .await
                .unwrap();
            assert_eq!(count, 0, "table {} not empty", table);
        }
    }

    #[tokio::test]
    async fn test_replace_all_overwrites_previous_content() {
        let (store, _temp) = test_store().await;

        let old_list = List::new("Old", ListKind::Todo, "user-1");
        store
            .replace_all("user-1", &[snapshot(old_list.clone(), vec![])])
            .await
            .unwrap();

        let new_list = List::new("New", ListKind::Shopping, "user-1");
        let item = Item::new(new_list.id, "bread");
        store
            .replace_all("user-1", &[snapshot(new_list.clone(), vec![item])])
            .await
            .unwrap();

        assert!(store.lists().get_by_id(old_list.id).await.unwrap().is_none());
        let fetched = store.lists().get_by_id(new_list.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "New");
        assert_eq!(store.items().get_list_items(new_list.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_all_clears_pending_on_inserted_items() {
        let (store, _temp) = test_store().await;

        let list = List::new("Groceries", ListKind::Shopping, "user-1");
        let mut item = Item::new(list.id, "milk");
        item.pending = false; // fetched items arrive confirmed
        store
            .replace_all("user-1", &[snapshot(list.clone(), vec![item])])
            .await
            .unwrap();

        assert_eq!(store.items().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_all_position_fallback_is_monotonic() {
        let (store, _temp) = test_store().await;

        let first = List::new("First", ListKind::Todo, "user-1");
        let second = List::new("Second", ListKind::Todo, "user-1");
        let snapshots = vec![
            ListSnapshot {
                list: first.clone(),
                position: Some(7),
                items: vec![],
            },
            ListSnapshot {
                list: second.clone(),
                position: None,
                items: vec![],
            },
        ];
        store.replace_all("user-1", &snapshots).await.unwrap();

        let positions = store.positions().for_user("user-1").await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(
            store.positions().get("user-1", first.id).await.unwrap(),
            Some(7)
        );
        assert_eq!(
            store.positions().get("user-1", second.id).await.unwrap(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_replace_all_failure_leaves_prior_state() {
        let (store, _temp) = test_store().await;

        let kept = List::new("Kept", ListKind::Shopping, "user-1");
        store
            .replace_all("user-1", &[snapshot(kept.clone(), vec![])])
            .await
            .unwrap();

        // A dataset with a duplicated primary key aborts the transaction.
        let dup = List::new("Dup", ListKind::Todo, "user-1");
        let result = store
            .replace_all(
                "user-1",
                &[snapshot(dup.clone(), vec![]), snapshot(dup.clone(), vec![])],
            )
            .await;
        assert!(result.is_err());

        // The pre-pull state is still observable.
        assert!(store.lists().get_by_id(kept.id).await.unwrap().is_some());
        assert!(store.lists().get_by_id(dup.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recovery_recreates_future_versioned_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replica.db");

        {
            let pool = connect(&path).await.unwrap();
            sqlx::query(&format!("PRAGMA user_version = {}", LATEST_VERSION + 5))
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;
        }

        assert!(matches!(
            open_store(&path).await,
            Err(StoreError::Incompatible { .. })
        ));

        let store = open_store_with_recovery(&path).await.unwrap();
        assert_eq!(
            schema::current_version(store.pool()).await.unwrap(),
            LATEST_VERSION
        );
        assert_eq!(store.items().pending_count().await.unwrap(), 0);
    }
}
