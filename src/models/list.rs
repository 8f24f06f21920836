//! Lists shared between users.
//!
//! A list is owned by exactly one user and may additionally be visible to
//! other users through the sharing relation managed by the remote store.
//! Deletion is logical: `deleted_at` is set and read paths filter the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of a list, controlling how the host application renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Shopping,
    Todo,
}

impl ListKind {
    /// String form stored in the replica database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Shopping => "shopping",
            ListKind::Todo => "todo",
        }
    }

    /// Parses the stored string form. Unknown kinds map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shopping" => Some(ListKind::Shopping),
            "todo" => Some(ListKind::Todo),
            _ => None,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A shopping or todo list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: Uuid,
    pub title: String,
    pub kind: ListKind,
    /// User id of the owner, as issued by the auth layer.
    pub owner: String,
    /// Whether other users can see this list. Membership itself lives in
    /// the remote store; the replica only carries the marker.
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl List {
    /// Creates a new unshared list owned by `owner`.
    pub fn new(title: impl Into<String>, kind: ListKind, owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            kind,
            owner: owner.into(),
            is_shared: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns true if the list has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
