//! Delta-sync checkpoint
//!
//! The checkpoint is opaque to the client. It is only ever replaced by the
//! value the server returns, so client clock skew cannot open or overlap a
//! sync window. The one locally computed value is the lookback default used
//! before any checkpoint is known.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncCheckpoint(String);

impl SyncCheckpoint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Checkpoint `hours` before `now`, for a client with no history.
    ///
    /// `None` if the window is negative or reaches outside the
    /// representable date range.
    pub fn lookback(now: DateTime<Utc>, hours: i64) -> Option<Self> {
        if hours < 0 {
            return None;
        }
        let since = now.checked_sub_signed(TimeDelta::try_hours(hours)?)?;
        Some(Self(since.to_rfc3339_opts(SecondsFormat::Millis, true)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{changes: ..., lastSync: timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDelta<T> {
    pub changes: T,
    pub last_sync: SyncCheckpoint,
}
