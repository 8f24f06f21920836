//! Wire types for the remote store's RPC surface and change feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CheckLog, Item, List};

/// Rejection reason reported when a newer remote version won.
pub const REASON_OUTDATED: &str = "outdated";

/// Projection of an item submitted to the batch-reconcile procedure.
///
/// Exactly the fields the remote store applies. The replica-only `pending`
/// marker has no representation here and never leaves the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushItem {
    pub id: Uuid,
    pub text: String,
    pub is_checked: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Item> for PushItem {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            text: item.text.clone(),
            is_checked: item.is_checked,
            updated_at: item.updated_at,
            deleted_at: item.deleted_at,
        }
    }
}

/// An item as the remote store represents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: Uuid,
    pub list_id: Uuid,
    pub text: String,
    pub is_checked: bool,
    #[serde(default)]
    pub quantity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RemoteItem {
    /// Converts to a replica item. Remote-sourced records are confirmed by
    /// definition, so `pending` is false.
    pub fn into_item(self) -> Item {
        Item {
            id: self.id,
            list_id: self.list_id,
            text: self.text,
            is_checked: self.is_checked,
            quantity: self.quantity,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            pending: false,
        }
    }
}

/// Per-record verdict from the batch-reconcile procedure.
///
/// Accepted writes echo the accepted record in `item`; rejected writes
/// echo the server's current version in `server_item` with
/// `reason = "outdated"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<RemoteItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_item: Option<RemoteItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReconcileOutcome {
    /// The id of the record this verdict refers to, taken from whichever
    /// record the server echoed back.
    pub fn record_id(&self) -> Option<Uuid> {
        self.item
            .as_ref()
            .map(|i| i.id)
            .or_else(|| self.server_item.as_ref().map(|i| i.id))
    }
}

/// Response of the batch-reconcile procedure. `server_time` is the remote
/// clock at reconciliation time, used for sync bookkeeping so client clock
/// skew stays out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResponse {
    pub results: Vec<ReconcileOutcome>,
    pub server_time: DateTime<Utc>,
}

/// One list from the full-fetch procedure: the list, the caller's ordering
/// preference and the list's non-deleted items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedList {
    pub list: List,
    #[serde(default)]
    pub position: Option<i64>,
    pub items: Vec<RemoteItem>,
}

/// Ordering preference sent to the position-save procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSave {
    pub list_id: Uuid,
    pub position: i64,
}

/// A check-log entry uploaded to the statistics stream. The remote ignores
/// ids it has already seen, so re-uploading after a lost acknowledgement is
/// harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckLogUpload {
    pub id: Uuid,
    pub user_id: String,
    pub list_name: String,
    pub item_name: String,
    pub checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Uuid>,
}

impl From<&CheckLog> for CheckLogUpload {
    fn from(entry: &CheckLog) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id.clone(),
            list_name: entry.list_name.clone(),
            item_name: entry.item_name.clone(),
            checked_at: entry.checked_at,
            list_id: entry.list_id,
            item_id: entry.item_id,
        }
    }
}

/// Row-level mutation event from the realtime change feed.
///
/// Events are unordered but causally delivered per record; `old` carries
/// at least the record id on deletes, `new` the full record on
/// inserts/updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    pub table: FeedTable,
    #[serde(default)]
    pub old: Option<serde_json::Value>,
    #[serde(default)]
    pub new: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedTable {
    Lists,
    Items,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_item(id: Uuid) -> RemoteItem {
        let now = Utc::now();
        RemoteItem {
            id,
            list_id: Uuid::new_v4(),
            text: "milk".to_string(),
            is_checked: false,
            quantity: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_push_item_has_no_pending_field() {
        let item = Item::new(Uuid::new_v4(), "milk");
        let push: PushItem = (&item).into();
        let json = serde_json::to_value(&push).unwrap();

        assert!(json.get("pending").is_none());
        assert!(json.get("list_id").is_none());
        assert_eq!(json.get("text").unwrap(), "milk");
    }

    #[test]
    fn test_push_item_skips_absent_deleted_at() {
        let item = Item::new(Uuid::new_v4(), "milk");
        let json = serde_json::to_value(PushItem::from(&item)).unwrap();
        assert!(json.get("deleted_at").is_none());
    }

    #[test]
    fn test_record_id_from_either_echo() {
        let id = Uuid::new_v4();

        let accepted = ReconcileOutcome {
            success: true,
            item: Some(remote_item(id)),
            server_item: None,
            reason: None,
        };
        assert_eq!(accepted.record_id(), Some(id));

        let rejected = ReconcileOutcome {
            success: false,
            item: None,
            server_item: Some(remote_item(id)),
            reason: Some(REASON_OUTDATED.to_string()),
        };
        assert_eq!(rejected.record_id(), Some(id));

        let empty = ReconcileOutcome {
            success: false,
            item: None,
            server_item: None,
            reason: None,
        };
        assert_eq!(empty.record_id(), None);
    }

    #[test]
    fn test_remote_item_into_item_is_not_pending() {
        let item = remote_item(Uuid::new_v4()).into_item();
        assert!(!item.pending);
    }

    #[test]
    fn test_change_event_wire_format() {
        let json = r#"{
            "eventType": "update",
            "table": "items",
            "new": {"id": "11111111-1111-1111-1111-111111111111"}
        }"#;
        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventType::Update);
        assert_eq!(event.table, FeedTable::Items);
        assert!(event.old.is_none());
        assert!(event.new.is_some());
    }

    #[test]
    fn test_push_response_roundtrip() {
        let response = PushResponse {
            results: vec![ReconcileOutcome {
                success: true,
                item: Some(remote_item(Uuid::new_v4())),
                server_item: None,
                reason: None,
            }],
            server_time: Utc::now(),
        };
        let json = serde_json::to_string(&response).unwrap();
        let back: PushResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.results.len(), 1);
        assert!(back.results[0].success);
    }
}
