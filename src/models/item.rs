//! Items belonging to a list.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single entry on a list.
///
/// `pending` is a replica-only marker meaning "edited here, not yet
/// confirmed by the remote store". It deliberately has no serde
/// representation: items cross the wire as `RemoteItem`, which cannot
/// carry the flag.
///
/// The remote store enforces that `(list_id, lowercase(text))` is unique
/// among non-deleted items of a list. The replica does not re-validate
/// this, so a local duplicate can exist transiently until the push
/// reconciler learns of the rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub list_id: Uuid,
    pub text: String,
    pub is_checked: bool,
    /// Free-form quantity ("2", "a few").
    pub quantity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub pending: bool,
}

impl Item {
    /// Creates a new locally-originated item. Local records start out
    /// pending until the remote store confirms them.
    pub fn new(list_id: Uuid, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            list_id,
            text: text.into(),
            is_checked: false,
            quantity: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            pending: true,
        }
    }

    /// Returns true if the item has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Partial update applied through `ItemRepository::update_with_pending`,
/// the only sanctioned local-mutation entry point. Unset fields keep their
/// current value.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub text: Option<String>,
    pub is_checked: Option<bool>,
    pub quantity: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn checked(mut self, is_checked: bool) -> Self {
        self.is_checked = Some(is_checked);
        self
    }

    pub fn quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    /// Marks the item soft-deleted as of now.
    pub fn delete(mut self) -> Self {
        self.deleted_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_is_pending() {
        let item = Item::new(Uuid::new_v4(), "milk");
        assert!(item.pending);
        assert!(!item.is_checked);
        assert!(!item.is_deleted());
    }

    #[test]
    fn test_patch_builder() {
        let patch = ItemPatch::new().text("oat milk").checked(true);
        assert_eq!(patch.text.as_deref(), Some("oat milk"));
        assert_eq!(patch.is_checked, Some(true));
        assert!(patch.quantity.is_none());
        assert!(patch.deleted_at.is_none());
    }

    #[test]
    fn test_patch_delete_stamps_time() {
        let patch = ItemPatch::new().delete();
        assert!(patch.deleted_at.is_some());
    }
}
