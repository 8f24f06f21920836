//! Full-sync pull: replace the replica wholesale with the remote dataset.
//!
//! The remote store is the single source of truth for access control, so a
//! list it no longer returns must disappear locally whatever the reason
//! (deleted, unshared, access revoked). Clearing and repopulating avoids
//! the delete-detection machinery an incremental diff would need.

use chrono::Utc;

use crate::db::{ListSnapshot, ReplicaStore};

use super::client::RemoteStore;
use super::error::SyncError;
use super::protocol::RemoteItem;

pub(crate) struct PullSummary {
    /// Lists replaced into the replica.
    pub lists: usize,
    /// Whether the fetched dataset carried anything newer than the
    /// previous sync.
    pub has_remote_changes: bool,
}

/// Fetches the complete authorized dataset and atomically replaces the
/// replica's content with it.
///
/// Nothing is written unless the fetch succeeds, and the replacement runs
/// in one transaction; a failure anywhere leaves the pre-pull state
/// observable.
pub(crate) async fn full_sync(
    store: &ReplicaStore,
    remote: &dyn RemoteStore,
    user_id: &str,
) -> Result<PullSummary, SyncError> {
    let fetched = remote.fetch_all().await?;

    let previous_sync = store.sync_meta().last_sync().await?;
    let newest_remote = fetched
        .iter()
        .flat_map(|f| {
            std::iter::once(f.list.updated_at).chain(f.items.iter().map(|i| i.updated_at))
        })
        .max();
    let has_remote_changes = match (previous_sync, newest_remote) {
        (Some(previous), Some(newest)) => newest > previous,
        (None, Some(_)) => true,
        _ => false,
    };

    let snapshots: Vec<ListSnapshot> = fetched
        .into_iter()
        .map(|f| ListSnapshot {
            list: f.list,
            position: f.position,
            items: f.items.into_iter().map(RemoteItem::into_item).collect(),
        })
        .collect();

    store.replace_all(user_id, &snapshots).await?;

    // Pull bookkeeping uses the client clock; push records the server's.
    store.sync_meta().set_last_sync(Utc::now()).await?;

    Ok(PullSummary {
        lists: snapshots.len(),
        has_remote_changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_store;
    use crate::models::{Item, List, ListKind};
    use crate::sync::testing::FakeRemote;
    use chrono::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn setup() -> (ReplicaStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir.path().join("replica.db")).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_full_sync_replaces_local_content() {
        let (store, _temp) = setup().await;
        let remote = FakeRemote::new();

        // Local list the remote no longer returns (e.g. sharing revoked).
        let stale = List::new("Stale", ListKind::Todo, "user-1");
        store.lists().insert(&stale).await.unwrap();

        let fresh = List::new("Fresh", ListKind::Shopping, "user-1");
        remote.seed_list(&fresh, Some(2), vec![Item::new(fresh.id, "milk")]);

        let summary = full_sync(&store, &remote, "user-1").await.unwrap();

        assert_eq!(summary.lists, 1);
        assert!(store.lists().get_by_id(stale.id).await.unwrap().is_none());
        assert!(store.lists().get_by_id(fresh.id).await.unwrap().is_some());
        assert_eq!(store.items().get_list_items(fresh.id).await.unwrap().len(), 1);
        assert_eq!(store.items().pending_count().await.unwrap(), 0);
        assert_eq!(store.positions().get("user-1", fresh.id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_full_sync_stamps_client_clock() {
        let (store, _temp) = setup().await;
        let remote = FakeRemote::new();

        let before = Utc::now();
        full_sync(&store, &remote, "user-1").await.unwrap();

        let last_sync = store.sync_meta().last_sync().await.unwrap().unwrap();
        assert!(last_sync >= before);
        assert!(last_sync <= Utc::now());
    }

    #[tokio::test]
    async fn test_has_remote_changes_against_previous_sync() {
        let (store, _temp) = setup().await;
        let remote = FakeRemote::new();

        let list = List::new("Groceries", ListKind::Shopping, "user-1");
        remote.seed_list(&list, None, vec![]);

        // First sync of an empty replica: everything is new.
        let summary = full_sync(&store, &remote, "user-1").await.unwrap();
        assert!(summary.has_remote_changes);

        // Nothing changed remotely since; the dataset is older than
        // last_sync now.
        let summary = full_sync(&store, &remote, "user-1").await.unwrap();
        assert!(!summary.has_remote_changes);

        // A remote edit newer than last_sync flips it back.
        let mut edited = list.clone();
        edited.updated_at = Utc::now() + Duration::seconds(5);
        remote.seed_list(&edited, None, vec![]);
        let summary = full_sync(&store, &remote, "user-1").await.unwrap();
        assert!(summary.has_remote_changes);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_store_untouched() {
        let (store, _temp) = setup().await;
        let remote = FakeRemote::new();
        remote.fail_next_fetch();

        let kept = List::new("Kept", ListKind::Todo, "user-1");
        store.lists().insert(&kept).await.unwrap();
        store.items().insert(&Item::new(kept.id, "milk")).await.unwrap();

        assert!(full_sync(&store, &remote, "user-1").await.is_err());

        assert!(store.lists().get_by_id(kept.id).await.unwrap().is_some());
        assert_eq!(store.items().get_list_items(kept.id).await.unwrap().len(), 1);
        assert!(store.sync_meta().last_sync().await.unwrap().is_none());
    }
}
