//! Versioned schema for the replica store.
//!
//! The schema is an ordered list of [`SchemaVersion`] descriptors applied
//! sequentially by [`run_upgrades`]. `PRAGMA user_version` records which
//! version a store is at; the version only ever increases. A step that
//! cannot complete falls back to recreating the tables it declares, leaving
//! them empty for the next full sync to repopulate.

use sqlx::SqlitePool;

use super::StoreError;

/// Latest schema version this client understands.
pub const LATEST_VERSION: i64 = 3;

/// One schema version: DDL reaching it from the previous version, plus the
/// reset statements used when the forward migration cannot complete.
pub(crate) struct SchemaVersion {
    pub version: i64,
    pub statements: &'static [&'static str],
    /// Destructive fallback: drop and recreate the affected tables at this
    /// version's shape.
    pub reset: &'static [&'static str],
}

pub(crate) const VERSIONS: &[SchemaVersion] = &[
    SchemaVersion {
        version: 1,
        statements: &[
            "CREATE TABLE IF NOT EXISTS lists (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                owner TEXT NOT NULL,
                is_shared INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                list_id TEXT NOT NULL,
                text TEXT NOT NULL,
                is_checked INTEGER NOT NULL DEFAULT 0,
                quantity TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                pending INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_items_list_id ON items(list_id)",
            "CREATE INDEX IF NOT EXISTS idx_items_pending ON items(pending)",
            "CREATE INDEX IF NOT EXISTS idx_items_updated_at ON items(updated_at)",
            "CREATE TABLE IF NOT EXISTS user_list_positions (
                user_id TEXT NOT NULL,
                list_id TEXT NOT NULL,
                position INTEGER NOT NULL
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_positions_user_list
                ON user_list_positions(user_id, list_id)",
            "CREATE TABLE IF NOT EXISTS sync_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
        reset: &[
            "DROP TABLE IF EXISTS lists",
            "DROP TABLE IF EXISTS items",
            "DROP TABLE IF EXISTS user_list_positions",
            "DROP TABLE IF EXISTS sync_meta",
            "CREATE TABLE lists (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                owner TEXT NOT NULL,
                is_shared INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )",
            "CREATE TABLE items (
                id TEXT PRIMARY KEY,
                list_id TEXT NOT NULL,
                text TEXT NOT NULL,
                is_checked INTEGER NOT NULL DEFAULT 0,
                quantity TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT,
                pending INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX idx_items_list_id ON items(list_id)",
            "CREATE INDEX idx_items_pending ON items(pending)",
            "CREATE INDEX idx_items_updated_at ON items(updated_at)",
            "CREATE TABLE user_list_positions (
                user_id TEXT NOT NULL,
                list_id TEXT NOT NULL,
                position INTEGER NOT NULL
            )",
            "CREATE UNIQUE INDEX idx_positions_user_list
                ON user_list_positions(user_id, list_id)",
            "CREATE TABLE sync_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
    },
    SchemaVersion {
        version: 2,
        statements: &[
            "CREATE TABLE IF NOT EXISTS check_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                list_name TEXT NOT NULL,
                item_name TEXT NOT NULL,
                checked_at TEXT NOT NULL,
                list_id TEXT,
                item_id TEXT,
                pending INTEGER NOT NULL DEFAULT 1
            )",
            "CREATE INDEX IF NOT EXISTS idx_check_logs_pending ON check_logs(pending)",
        ],
        reset: &[
            "DROP TABLE IF EXISTS check_logs",
            "CREATE TABLE check_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                list_name TEXT NOT NULL,
                item_name TEXT NOT NULL,
                checked_at TEXT NOT NULL,
                list_id TEXT,
                item_id TEXT,
                pending INTEGER NOT NULL DEFAULT 1
            )",
            "CREATE INDEX idx_check_logs_pending ON check_logs(pending)",
        ],
    },
    // v3 rebuilds user_list_positions with a composite primary key. SQLite
    // cannot alter a primary key in place, so the migration copies rows
    // through a replacement table.
    SchemaVersion {
        version: 3,
        statements: &[
            "CREATE TABLE user_list_positions_new (
                user_id TEXT NOT NULL,
                list_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (user_id, list_id)
            )",
            "INSERT INTO user_list_positions_new (user_id, list_id, position)
                SELECT user_id, list_id, position FROM user_list_positions",
            "DROP TABLE user_list_positions",
            "ALTER TABLE user_list_positions_new RENAME TO user_list_positions",
        ],
        reset: &[
            "DROP TABLE IF EXISTS user_list_positions_new",
            "DROP TABLE IF EXISTS user_list_positions",
            "CREATE TABLE user_list_positions (
                user_id TEXT NOT NULL,
                list_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (user_id, list_id)
            )",
        ],
    },
];

/// Reads the store's current schema version.
pub(crate) async fn current_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("PRAGMA user_version").fetch_one(pool).await
}

/// Applies every schema version newer than the store's current one.
///
/// A store from a future client version is refused with
/// [`StoreError::Incompatible`]; the upgrade path is monotonic.
pub(crate) async fn run_upgrades(pool: &SqlitePool) -> Result<(), StoreError> {
    let current = current_version(pool).await?;

    if current > LATEST_VERSION {
        return Err(StoreError::Incompatible {
            found: current,
            supported: LATEST_VERSION,
        });
    }

    for step in VERSIONS.iter().filter(|v| v.version > current) {
        apply_step(pool, step).await?;
    }

    Ok(())
}

/// Applies a single version in one transaction. If the forward migration
/// fails, the step's reset statements recreate the affected tables empty;
/// the next full sync repopulates them.
async fn apply_step(pool: &SqlitePool, step: &SchemaVersion) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    let mut failed = None;
    for stmt in step.statements {
        if let Err(e) = sqlx::query(stmt).execute(&mut *tx).await {
            failed = Some(e);
            break;
        }
    }

    match failed {
        None => {
            set_version(&mut tx, step.version).await?;
            tx.commit().await?;
        }
        Some(e) => {
            tracing::warn!(
                version = step.version,
                "schema migration failed ({}), clearing affected tables",
                e
            );
            tx.rollback().await?;

            let mut tx = pool.begin().await?;
            for stmt in step.reset {
                sqlx::query(stmt).execute(&mut *tx).await?;
            }
            set_version(&mut tx, step.version).await?;
            tx.commit().await?;
        }
    }

    Ok(())
}

async fn set_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    version: i64,
) -> Result<(), sqlx::Error> {
    // PRAGMA values cannot be bound as parameters.
    sqlx::query(&format!("PRAGMA user_version = {}", version))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_store;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fresh_store_is_at_latest_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir.path().join("replica.db")).await.unwrap();

        let version = current_version(store.pool()).await.unwrap();
        assert_eq!(version, LATEST_VERSION);
    }

    #[tokio::test]
    async fn test_upgrade_preserves_rows_across_reshape() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replica.db");

        // Build a v2 store by hand, with a position row in the pre-reshape
        // table, then let run_upgrades carry it to v3.
        let pool = crate::db::connect(&path).await.unwrap();
        for step in VERSIONS.iter().filter(|v| v.version <= 2) {
            for stmt in step.statements {
                sqlx::query(stmt).execute(&pool).await.unwrap();
            }
        }
        sqlx::query("PRAGMA user_version = 2").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO user_list_positions (user_id, list_id, position) VALUES (?, ?, ?)")
            .bind("user-1")
            .bind("11111111-1111-1111-1111-111111111111")
            .bind(4i64)
            .execute(&pool)
            .await
            .unwrap();

        run_upgrades(&pool).await.unwrap();

        assert_eq!(current_version(&pool).await.unwrap(), 3);
        let position: i64 = sqlx::query_scalar(
            "SELECT position FROM user_list_positions WHERE user_id = 'user-1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(position, 4);
    }

    #[tokio::test]
    async fn test_failed_migration_clears_affected_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replica.db");

        // A v2 store whose positions table is missing the position column:
        // the v3 copy statement cannot complete, forcing the destructive
        // fallback.
        let pool = crate::db::connect(&path).await.unwrap();
        for step in VERSIONS.iter().filter(|v| v.version <= 2) {
            for stmt in step.statements {
                sqlx::query(stmt).execute(&pool).await.unwrap();
            }
        }
        sqlx::query("DROP TABLE user_list_positions").execute(&pool).await.unwrap();
        sqlx::query("CREATE TABLE user_list_positions (user_id TEXT NOT NULL, list_id TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("PRAGMA user_version = 2").execute(&pool).await.unwrap();

        run_upgrades(&pool).await.unwrap();

        assert_eq!(current_version(&pool).await.unwrap(), 3);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_list_positions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
        // The recreated table has the v3 shape.
        sqlx::query("INSERT INTO user_list_positions (user_id, list_id, position) VALUES ('u', 'l', 1)")
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_future_version_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replica.db");

        let pool = crate::db::connect(&path).await.unwrap();
        sqlx::query(&format!("PRAGMA user_version = {}", LATEST_VERSION + 1))
            .execute(&pool)
            .await
            .unwrap();

        let err = run_upgrades(&pool).await.unwrap_err();
        match err {
            StoreError::Incompatible { found, supported } => {
                assert_eq!(found, LATEST_VERSION + 1);
                assert_eq!(supported, LATEST_VERSION);
            }
            other => panic!("expected Incompatible, got {:?}", other),
        }
    }
}
