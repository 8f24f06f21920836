//! Remote store access.
//!
//! [`RemoteStore`] is the port the sync engine talks through; [`HttpRemote`]
//! is the production adapter speaking JSON over HTTP against the sync
//! server. Tests swap in an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::SyncError;
use super::protocol::{CheckLogUpload, FetchedList, PositionSave, PushItem, PushResponse};

/// How long the reachability probe waits before declaring the server
/// offline.
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(3);

/// The remote authoritative store, reduced to the RPC surface the sync
/// engine needs.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Batch-reconciles pending items in one call. The remote applies
    /// per-record LWW and echoes a verdict for each submitted record.
    async fn reconcile_items(&self, batch: Vec<PushItem>) -> Result<PushResponse, SyncError>;

    /// Fetches every list the authenticated user may access, with items
    /// and per-list positions.
    async fn fetch_all(&self) -> Result<Vec<FetchedList>, SyncError>;

    /// Idempotent upsert of per-list ordering preferences.
    async fn save_positions(&self, positions: Vec<PositionSave>) -> Result<(), SyncError>;

    /// Appends check-log entries to the statistics stream.
    async fn log_checks(&self, entries: Vec<CheckLogUpload>) -> Result<(), SyncError>;

    /// Cheap reachability probe used by the fail-fast entry points.
    async fn is_reachable(&self) -> bool;
}

/// HTTP adapter for the sync server.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    server_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpRemote {
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Builds an HTTP URL for a given path, coercing ws(s) schemes.
    fn build_http_url(&self, path: &str) -> String {
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replace("ws://", "http://")
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replace("wss://", "https://")
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    /// Builds the WebSocket URL for the change feed, coercing http(s)
    /// schemes.
    pub fn build_ws_url(&self) -> String {
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replace("http://", "ws://")
        } else if self.server_url.starts_with("https://") {
            self.server_url.replace("https://", "wss://")
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!(
            "{}/changes?key={}",
            base_url.trim_end_matches('/'),
            self.api_key
        )
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, SyncError> {
        let response = self
            .http
            .post(self.build_http_url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Remote(format!(
                "server returned status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, SyncError> {
        let response = self
            .http
            .get(self.build_http_url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Remote(format!(
                "server returned status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn reconcile_items(&self, batch: Vec<PushItem>) -> Result<PushResponse, SyncError> {
        self.post_json("/sync/items", &batch).await
    }

    async fn fetch_all(&self) -> Result<Vec<FetchedList>, SyncError> {
        self.get_json("/sync/full").await
    }

    async fn save_positions(&self, positions: Vec<PositionSave>) -> Result<(), SyncError> {
        let _: serde_json::Value = self.post_json("/sync/positions", &positions).await?;
        Ok(())
    }

    async fn log_checks(&self, entries: Vec<CheckLogUpload>) -> Result<(), SyncError> {
        let _: serde_json::Value = self.post_json("/sync/checks", &entries).await?;
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        let request = self
            .http
            .get(self.build_http_url("/health"))
            .timeout(REACHABILITY_TIMEOUT);

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
