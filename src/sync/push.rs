//! Push reconciliation: propagate pending local edits to the remote store.

use uuid::Uuid;

use crate::db::ReplicaStore;

use super::client::RemoteStore;
use super::error::SyncError;
use super::protocol::{CheckLogUpload, PushItem};

/// Sends every pending item to the remote store in one batch and applies
/// the per-record verdicts. Returns the number of accepted records.
///
/// Local state is only mutated after the batch call succeeds, so a
/// transport failure leaves every pending flag in place for the next
/// attempt.
pub(crate) async fn push_pending(
    store: &ReplicaStore,
    remote: &dyn RemoteStore,
) -> Result<usize, SyncError> {
    let pending = store.items().get_pending().await?;
    if pending.is_empty() {
        return Ok(0);
    }

    let batch: Vec<PushItem> = pending.iter().map(PushItem::from).collect();
    let response = remote.reconcile_items(batch).await?;

    let items = store.items();
    let mut accepted = 0usize;

    for outcome in &response.results {
        let Some(id) = outcome.record_id() else {
            tracing::warn!("reconcile verdict without a record id, skipping");
            continue;
        };

        if outcome.success {
            // The local version is now canonical; only the flag changes.
            items.clear_pending(id).await?;
            accepted += 1;
        } else {
            match &outcome.server_item {
                Some(server_item) => {
                    items.overwrite(&server_item.clone().into_item()).await?;
                }
                None => {
                    tracing::warn!(%id, "rejected verdict without a server record, skipping");
                }
            }
        }
    }

    // The server clock is authoritative for sync bookkeeping.
    store.sync_meta().set_last_sync(response.server_time).await?;

    Ok(accepted)
}

/// Best-effort upload of pending check-log entries.
///
/// The statistics stream must not fail the item push; errors are logged
/// and the entries stay pending for the next sync. The remote ignores ids
/// it has already seen, so a lost acknowledgement only costs a re-upload.
pub(crate) async fn flush_check_logs(store: &ReplicaStore, remote: &dyn RemoteStore) {
    let pending = match store.check_logs().pending().await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::warn!("failed to read pending check logs: {}", e);
            return;
        }
    };
    if pending.is_empty() {
        return;
    }

    let entries: Vec<CheckLogUpload> = pending.iter().map(CheckLogUpload::from).collect();
    let ids: Vec<Uuid> = pending.iter().map(|entry| entry.id).collect();

    match remote.log_checks(entries).await {
        Ok(()) => {
            if let Err(e) = store.check_logs().mark_acknowledged(&ids).await {
                tracing::warn!("failed to acknowledge check logs locally: {}", e);
            }
        }
        Err(e) => {
            tracing::warn!("check log upload failed: {}", e);
        }
    }
}
