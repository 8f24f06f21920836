//! Per-user list ordering preferences.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where one user places one list in their own ordering.
///
/// Unique per `(user_id, list_id)`; each user orders the same shared
/// lists independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListPosition {
    pub user_id: String,
    pub list_id: Uuid,
    pub position: i64,
}

impl UserListPosition {
    pub fn new(user_id: impl Into<String>, list_id: Uuid, position: i64) -> Self {
        Self {
            user_id: user_id.into(),
            list_id,
            position,
        }
    }
}
