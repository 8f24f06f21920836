//! Check events for the statistics stream.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A record of one item being checked off.
///
/// Append-only: entries are never updated or deleted, only uploaded.
/// `pending` marks entries the remote store has not acknowledged yet.
/// Names are denormalized so the entry survives its list being deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckLog {
    pub id: Uuid,
    pub user_id: String,
    pub list_name: String,
    pub item_name: String,
    pub checked_at: DateTime<Utc>,
    pub list_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub pending: bool,
}

impl CheckLog {
    /// Records a check event as of now, pending upload.
    pub fn record(
        user_id: impl Into<String>,
        list_name: impl Into<String>,
        item_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            list_name: list_name.into(),
            item_name: item_name.into(),
            checked_at: Utc::now(),
            list_id: None,
            item_id: None,
            pending: true,
        }
    }

    /// Attaches the source list and item ids.
    pub fn with_source(mut self, list_id: Uuid, item_id: Uuid) -> Self {
        self.list_id = Some(list_id);
        self.item_id = Some(item_id);
        self
    }
}
