//! Resumable upload session state
//!
//! An `UploadSession` is created once the server has opened a session and
//! is mutated only by acknowledged chunk responses.
//!
//! Invariants:
//! - `uploaded_bytes` never decreases while the session is uploading
//! - `next_chunk_index * chunk_size >= uploaded_bytes` (a chunk counts as
//!   sent only after its response has been observed)

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TidewireError};
use crate::impl_wire_enum_conversions;

/// Kind of media being uploaded; selects server-side processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Image,
    Video,
    Audio,
    Avatar,
    Document,
}

impl_wire_enum_conversions!(UploadType {
    Image => "image",
    Video => "video",
    Audio => "audio",
    Avatar => "avatar",
    Document => "document",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Cancelled,
    Failed,
}

impl_wire_enum_conversions!(UploadStatus {
    Pending => "pending",
    Uploading => "uploading",
    Completed => "completed",
    Cancelled => "cancelled",
    Failed => "failed",
});

impl UploadStatus {
    /// Completed and Cancelled sessions accept no further work.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub session_id: String,
    pub filename: String,
    pub total_size: u64,
    pub upload_type: UploadType,
    pub chunk_size: u64,
    pub next_chunk_index: u64,
    pub uploaded_bytes: u64,
    /// Last cumulative percentage reported by the server (0..=100)
    pub progress_percent: f64,
    pub status: UploadStatus,
}

impl UploadSession {
    pub fn new(
        session_id: impl Into<String>,
        filename: impl Into<String>,
        total_size: u64,
        upload_type: UploadType,
        chunk_size: u64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            filename: filename.into(),
            total_size,
            upload_type,
            chunk_size: chunk_size.max(1),
            next_chunk_index: 0,
            uploaded_bytes: 0,
            progress_percent: 0.0,
            status: UploadStatus::Pending,
        }
    }

    /// `ceil(total_size / chunk_size)`
    pub fn total_chunks(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size)
    }

    /// Byte range of chunk `index` within the payload.
    pub fn chunk_range(&self, index: u64) -> Range<u64> {
        let start = index.saturating_mul(self.chunk_size).min(self.total_size);
        let end = start.saturating_add(self.chunk_size).min(self.total_size);
        start..end
    }

    pub fn is_fully_acknowledged(&self) -> bool {
        self.next_chunk_index >= self.total_chunks()
    }

    /// Record the server's acknowledgement of chunk `index`.
    ///
    /// Chunks are acknowledged strictly in order; the stored percentage is
    /// whatever the server reported.
    ///
    /// # Errors
    /// Returns `TidewireError::InvalidInput` if `index` is not the next
    /// expected chunk or the session is not uploading.
    pub fn record_chunk_ack(&mut self, index: u64, server_progress: f64) -> Result<()> {
        if self.status != UploadStatus::Uploading {
            return Err(TidewireError::InvalidInput(format!(
                "session {} is {}, cannot acknowledge chunks",
                self.session_id, self.status
            )));
        }
        if index != self.next_chunk_index {
            return Err(TidewireError::InvalidInput(format!(
                "chunk {index} acknowledged out of order (expected {})",
                self.next_chunk_index
            )));
        }

        self.next_chunk_index += 1;
        let acknowledged = self.chunk_range(index).end;
        self.uploaded_bytes = self.uploaded_bytes.max(acknowledged);
        self.progress_percent = server_progress.clamp(0.0, 100.0);
        Ok(())
    }

    /// Move to `Completed` once the server has finalized the session.
    ///
    /// # Errors
    /// Returns `TidewireError::InvalidInput` if chunks are outstanding or
    /// the session already ended.
    pub fn mark_completed(&mut self) -> Result<()> {
        if self.status.is_terminal() || !self.is_fully_acknowledged() {
            return Err(TidewireError::InvalidInput(format!(
                "session {} is {} with {} of {} chunks acknowledged, cannot complete",
                self.session_id,
                self.status,
                self.next_chunk_index,
                self.total_chunks()
            )));
        }
        self.status = UploadStatus::Completed;
        Ok(())
    }

    pub fn progress(&self, chunk_index: u64) -> UploadProgress {
        UploadProgress {
            session_id: self.session_id.clone(),
            chunk_index,
            total_chunks: self.total_chunks(),
            uploaded_bytes: self.uploaded_bytes,
            total_size: self.total_size,
            percent: self.progress_percent,
        }
    }
}

/// Progress event emitted after each acknowledged chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub session_id: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub uploaded_bytes: u64,
    pub total_size: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadRequest {
    pub filename: String,
    pub total_size: u64,
    pub upload_type: UploadType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkUploadResponse {
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub session_id: String,
    pub upload_type: UploadType,
}

/// Final media descriptor returned by upload completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn uploading(total: u64) -> UploadSession {
        let mut session = UploadSession::new("s1", "clip.mp4", total, UploadType::Video, MIB);
        session.status = UploadStatus::Uploading;
        session
    }

    #[test]
    fn total_chunks_rounds_up() {
        assert_eq!(uploading(3 * MIB).total_chunks(), 3);
        assert_eq!(uploading(3 * MIB + 1).total_chunks(), 4);
        assert_eq!(uploading(1).total_chunks(), 1);
        assert_eq!(uploading(0).total_chunks(), 0);
    }

    #[test]
    fn last_chunk_range_is_short() {
        let session = uploading(2 * MIB + 10);
        assert_eq!(session.chunk_range(2), 2 * MIB..2 * MIB + 10);
    }

    #[test]
    fn acks_advance_bytes_monotonically() {
        let mut session = uploading(2 * MIB + 10);
        session.record_chunk_ack(0, 45.0).unwrap();
        assert_eq!(session.uploaded_bytes, MIB);
        session.record_chunk_ack(1, 90.0).unwrap();
        session.record_chunk_ack(2, 100.0).unwrap();
        assert_eq!(session.uploaded_bytes, 2 * MIB + 10);
        assert!(session.is_fully_acknowledged());
        assert!(session.next_chunk_index * session.chunk_size >= session.uploaded_bytes);
    }

    #[test]
    fn out_of_order_ack_is_rejected() {
        let mut session = uploading(3 * MIB);
        assert!(session.record_chunk_ack(1, 50.0).is_err());
        assert_eq!(session.next_chunk_index, 0);
        assert_eq!(session.uploaded_bytes, 0);
    }

    #[test]
    fn ack_requires_uploading_status() {
        let mut session = uploading(MIB);
        session.status = UploadStatus::Cancelled;
        assert!(session.record_chunk_ack(0, 100.0).is_err());
    }

    #[test]
    fn completion_requires_every_chunk() {
        let mut session = uploading(2 * MIB);
        session.record_chunk_ack(0, 50.0).unwrap();
        assert!(session.mark_completed().is_err());
        assert_eq!(session.status, UploadStatus::Uploading);

        session.record_chunk_ack(1, 100.0).unwrap();
        session.mark_completed().unwrap();
        assert_eq!(session.status, UploadStatus::Completed);
        assert!(session.mark_completed().is_err());
    }

    #[test]
    fn wire_names_are_lowercase() {
        let body = StartUploadRequest {
            filename: "a.png".into(),
            total_size: 5,
            upload_type: UploadType::Image,
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["uploadType"], "image");
        assert_eq!(json["totalSize"], 5);
    }

    #[test]
    fn media_descriptor_keeps_extra_fields() {
        let media: MediaDescriptor =
            serde_json::from_str(r#"{"id":"m1","url":"https://cdn/x","width":640}"#).unwrap();
        assert_eq!(media.id.as_deref(), Some("m1"));
        assert_eq!(media.metadata["width"], 640);
    }
}
