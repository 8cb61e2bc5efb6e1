//! Offline-to-online delta reconciliation
//!
//! The reconciler asks for changes since its checkpoint and stores the
//! checkpoint the server returns. It never derives a checkpoint from the
//! local clock except for the initial lookback window.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tidewire_domain::constants::SYNC_PATH;
use tidewire_domain::{SyncCheckpoint, SyncDelta};
use tracing::{debug, info, instrument};

use super::client::ApiClient;
use super::errors::ApiError;
use super::request::ApiRequest;

pub struct SyncReconciler {
    client: Arc<ApiClient>,
    checkpoint: RwLock<Option<SyncCheckpoint>>,
    lookback_hours: i64,
}

impl SyncReconciler {
    pub fn new(client: Arc<ApiClient>) -> Self {
        let lookback_hours = client.config().sync_default_lookback_hours;
        Self { client, checkpoint: RwLock::new(None), lookback_hours }
    }

    /// Resume from a checkpoint persisted by the host.
    pub fn with_checkpoint(client: Arc<ApiClient>, checkpoint: SyncCheckpoint) -> Self {
        let reconciler = Self::new(client);
        *reconciler.checkpoint.write() = Some(checkpoint);
        reconciler
    }

    /// Last checkpoint returned by the server, if any.
    pub fn checkpoint(&self) -> Option<SyncCheckpoint> {
        self.checkpoint.read().clone()
    }

    /// Fetch changes since `since`, the held checkpoint, or the lookback
    /// window, in that order of preference.
    ///
    /// Overlapping calls are not coalesced; each replaces the checkpoint
    /// with its own response.
    ///
    /// # Errors
    /// Any request error. The checkpoint is only replaced on success.
    #[instrument(skip(self, since))]
    pub async fn sync<T: DeserializeOwned>(
        &self,
        since: Option<SyncCheckpoint>,
    ) -> Result<SyncDelta<T>, ApiError> {
        let since = match since.or_else(|| self.checkpoint()) {
            Some(checkpoint) => checkpoint,
            None => SyncCheckpoint::lookback(Utc::now(), self.lookback_hours).ok_or_else(|| {
                ApiError::Config(format!(
                    "sync lookback of {} hours is out of range",
                    self.lookback_hours
                ))
            })?,
        };
        debug!(since = %since, "requesting delta");

        let request = ApiRequest::get(SYNC_PATH).query("lastSync", since.as_str());
        let delta: SyncDelta<T> = self.client.send(&request).await?;

        *self.checkpoint.write() = Some(delta.last_sync.clone());
        info!(previous = %since, checkpoint = %delta.last_sync, "sync checkpoint advanced");
        Ok(delta)
    }
}
