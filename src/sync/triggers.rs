//! Background sync triggers.
//!
//! The host application reports connectivity and focus events on a
//! channel; armed triggers run a fire-and-forget sync. Errors are logged,
//! never surfaced: background syncs are best-effort and the next trigger
//! retries.

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SyncEngine;

/// Which trigger kinds are armed.
///
/// `visibility_change` exists but ships disabled: running a sync on every
/// tab/window focus caused UI responsiveness regressions, so the trigger
/// stays registered but off until that is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    pub online: bool,
    pub visibility_change: bool,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            online: true,
            visibility_change: false,
        }
    }
}

/// A host-reported event that may trigger a background sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Connectivity came back.
    Online,
    /// The application window became visible again.
    VisibilityChange,
}

/// Consumes host events and runs a sync for each armed one.
///
/// The loop ends when the event channel closes.
pub fn spawn_trigger_loop(
    engine: SyncEngine,
    settings: TriggerSettings,
    mut events: mpsc::Receiver<TriggerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let armed = match event {
                TriggerEvent::Online => settings.online,
                TriggerEvent::VisibilityChange => settings.visibility_change,
            };
            if !armed {
                tracing::debug!(?event, "trigger not armed, ignoring");
                continue;
            }

            match engine.sync().await {
                Ok(outcome) => tracing::debug!(
                    pushed = outcome.pushed,
                    pulled = outcome.pulled,
                    "background sync complete"
                ),
                Err(e) => tracing::warn!("background sync failed: {}", e),
            }
        }
    })
}
