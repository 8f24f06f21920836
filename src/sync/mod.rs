//! Sync engine: keeps the local replica consistent with the remote store.
//!
//! One [`SyncEngine::sync`] call runs push reconciliation (pending local
//! edits, per-record LWW) and then a full pull that replaces the replica
//! with the remote dataset. The realtime listener keeps the replica fresh
//! between syncs; triggers re-run sync when connectivity returns.

mod client;
mod error;
pub mod protocol;
mod pull;
mod push;
mod realtime;
mod triggers;

pub use client::{HttpRemote, RemoteStore};
pub use error::SyncError;
pub use realtime::{spawn_applier, RealtimeListener};
pub use triggers::{spawn_trigger_loop, TriggerEvent, TriggerSettings};

use std::sync::Arc;

use crate::db::ReplicaStore;

/// Aggregated result of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Pending items the remote store accepted.
    pub pushed: usize,
    /// Lists replaced into the replica by the pull phase.
    pub pulled: usize,
    /// Whether the pull brought back records newer than the previous sync.
    pub has_remote_changes: bool,
}

/// Ties the replica store to a remote store for one signed-in user.
///
/// Cheap to clone; clones share the store pool and the remote handle.
#[derive(Clone)]
pub struct SyncEngine {
    store: ReplicaStore,
    remote: Arc<dyn RemoteStore>,
    user_id: String,
}

impl SyncEngine {
    pub fn new(
        store: ReplicaStore,
        remote: Arc<dyn RemoteStore>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            remote,
            user_id: user_id.into(),
        }
    }

    pub fn store(&self) -> &ReplicaStore {
        &self.store
    }

    /// Runs push reconciliation followed by a full pull.
    ///
    /// Push is fully sequenced before pull so the pull observes a remote
    /// state that already reflects this client's own writes; pulling first
    /// could silently drop a pending edit.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let pushed = push::push_pending(&self.store, self.remote.as_ref()).await?;
        push::flush_check_logs(&self.store, self.remote.as_ref()).await;

        let pull = pull::full_sync(&self.store, self.remote.as_ref(), &self.user_id).await?;

        Ok(SyncOutcome {
            pushed,
            pulled: pull.lists,
            has_remote_changes: pull.has_remote_changes,
        })
    }

    /// Like [`sync`](Self::sync), but fails fast with
    /// [`SyncError::Offline`] when the remote store is unreachable.
    pub async fn manual_sync(&self) -> Result<SyncOutcome, SyncError> {
        if !self.remote.is_reachable().await {
            return Err(SyncError::Offline);
        }
        self.sync().await
    }

    /// Drops the entire local cache and rebuilds it from the remote store.
    /// Used when the user explicitly distrusts the local data.
    ///
    /// The reachability check runs before anything is cleared: an offline
    /// client must not destroy local data it has no way to repopulate.
    pub async fn clear_cache_and_sync(&self) -> Result<SyncOutcome, SyncError> {
        if !self.remote.is_reachable().await {
            return Err(SyncError::Offline);
        }
        self.store.clear_all().await?;
        self.sync().await
    }

    /// Persists the user's list ordering locally and pushes it to the
    /// remote store's idempotent position upsert.
    ///
    /// The remote call is best-effort: ordering is preference data and
    /// also travels back with every full pull, so a failed upload only
    /// costs the other devices a delay.
    pub async fn save_positions(
        &self,
        positions: Vec<protocol::PositionSave>,
    ) -> Result<(), SyncError> {
        for entry in &positions {
            self.store
                .positions()
                .set(&self.user_id, entry.list_id, entry.position)
                .await?;
        }

        if let Err(e) = self.remote.save_positions(positions).await {
            tracing::warn!("failed to push list positions: {}", e);
        }

        Ok(())
    }
}
