//! listsync: an offline-first replica of shared shopping and todo lists.
//!
//! The crate keeps a local SQLite replica consistent with a remote
//! authoritative store. Local edits are written to the replica marked
//! pending, pushed in batches with per-record last-write-wins
//! reconciliation, and every sync ends with a full pull that replaces the
//! replica with the remote dataset. In between syncs a realtime change
//! feed merges other clients' edits without clobbering newer local state.
//!
//! Conflicting writes are resolved purely by timestamp precedence; a true
//! concurrent edit loses one side, by design.

pub mod config;
pub mod db;
pub mod models;
pub mod sync;

pub use config::{Config, ConfigError};
pub use db::{open_store, open_store_with_recovery, ReplicaStore, StoreError};
pub use models::{CheckLog, Item, ItemPatch, List, ListKind, UserListPosition};
pub use sync::{
    HttpRemote, RealtimeListener, RemoteStore, SyncEngine, SyncError, SyncOutcome,
    TriggerSettings,
};
