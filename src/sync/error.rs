//! Sync error taxonomy.

use thiserror::Error;

/// Errors surfaced by the sync engine.
///
/// Reconciliation rejections ("outdated") are not errors; they are normal
/// protocol outcomes resolved by overwriting the local record.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store is unreachable and the caller asked to fail fast.
    #[error("remote store unreachable; try again when back online")]
    Offline,

    /// Transport-level failure talking to the remote store.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote store refused the request (auth failure, bad batch).
    #[error("remote store rejected the request: {0}")]
    Remote(String),

    /// Failure on the realtime change feed connection.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Local replica store failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The remote store answered with something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),
}
