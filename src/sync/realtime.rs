//! Realtime merge listener.
//!
//! A reader task consumes the server's change feed over a websocket and
//! publishes parsed events on a channel; a single applier task drains the
//! channel into the replica store. Keeping the store writes in one
//! consumer means a second feed connection can never race the first.
//!
//! This layer is an optimization, not a correctness requirement: every
//! write is an LWW comparison, so interleaving with a running sync cannot
//! regress the replica, and dropped events are reconverged by the next
//! full sync.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::db::ReplicaStore;
use crate::models::List;

use super::error::SyncError;
use super::protocol::{ChangeEvent, EventType, FeedTable, RemoteItem};

/// Buffered events between the reader and the applier.
const CHANNEL_CAPACITY: usize = 64;

/// Handle to the running listener tasks.
pub struct RealtimeListener {
    reader: JoinHandle<()>,
    applier: JoinHandle<()>,
}

impl RealtimeListener {
    /// Connects to the change feed and starts the reader and applier
    /// tasks.
    pub async fn start(ws_url: &str, store: ReplicaStore) -> Result<Self, SyncError> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| SyncError::WebSocket(e.to_string()))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_loop(ws_stream, tx));
        let applier = spawn_applier(store, rx);

        Ok(Self { reader, applier })
    }

    /// Stops both tasks. Events lost while detached are safe; the next
    /// full sync reconverges the replica.
    pub fn shutdown(self) {
        self.reader.abort();
        self.applier.abort();
    }
}

async fn read_loop(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    tx: mpsc::Sender<ChangeEvent>,
) {
    let (mut sender, mut receiver) = ws_stream.split();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ChangeEvent>(text.as_str()) {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                // One bad event must not take the listener down.
                Err(e) => tracing::warn!("unparseable change event: {}", e),
            },
            Ok(Message::Ping(data)) => {
                let _ = sender.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                tracing::debug!("change feed closed by server");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("change feed error: {}", e);
                break;
            }
        }
    }
}

/// Spawns the single consumer that applies change events to the store.
pub fn spawn_applier(store: ReplicaStore, mut rx: mpsc::Receiver<ChangeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = apply_event(&store, event).await {
                tracing::warn!("failed to apply change event: {}", e);
            }
        }
    })
}

/// Merges one feed event into the replica.
///
/// Inserts and updates are LWW-guarded upserts that never set `pending`;
/// a list deletion cascades to its items locally, mirroring the remote
/// store's own cascade.
pub(crate) async fn apply_event(store: &ReplicaStore, event: ChangeEvent) -> Result<(), SyncError> {
    match (event.table, event.event_type) {
        (FeedTable::Lists, EventType::Insert | EventType::Update) => {
            let list: List = parse_record(event.new)?;
            store.lists().merge_if_newer(&list).await?;
        }
        (FeedTable::Lists, EventType::Delete) => {
            let id = record_id(event.old.as_ref())?;
            store.lists().delete_cascade(id).await?;
        }
        (FeedTable::Items, EventType::Insert | EventType::Update) => {
            let item: RemoteItem = parse_record(event.new)?;
            store.items().merge_if_newer(&item.into_item()).await?;
        }
        (FeedTable::Items, EventType::Delete) => {
            let id = record_id(event.old.as_ref())?;
            store.items().delete_row(id).await?;
        }
    }
    Ok(())
}

fn parse_record<T: serde::de::DeserializeOwned>(
    value: Option<serde_json::Value>,
) -> Result<T, SyncError> {
    let value = value.ok_or_else(|| SyncError::Protocol("event without a record".to_string()))?;
    serde_json::from_value(value).map_err(|e| SyncError::Protocol(e.to_string()))
}

fn record_id(value: Option<&serde_json::Value>) -> Result<Uuid, SyncError> {
    value
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| SyncError::Protocol("delete event without a record id".to_string()))
}
