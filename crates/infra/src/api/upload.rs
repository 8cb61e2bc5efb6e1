//! Resumable chunked uploads
//!
//! A session is opened on the server, then chunks are sent one at a time in
//! index order. Progress is whatever the server acknowledges; a failed chunk
//! leaves the session `Failed` with everything acknowledged so far intact,
//! and [`UploadManager::upload_remaining`] picks up from the next chunk.
//!
//! Sessions live in the manager until they complete or are cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tidewire_domain::constants::{
    UPLOAD_CHUNK_PATH, UPLOAD_COMPLETE_PATH, UPLOAD_SESSION_PATH, UPLOAD_START_PATH,
};
use tidewire_domain::{
    ChunkUploadResponse, CompleteUploadRequest, MediaDescriptor, StartUploadRequest,
    StartUploadResponse, UploadProgress, UploadSession, UploadStatus, UploadType,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::ApiClient;
use super::errors::ApiError;
use super::request::{ApiRequest, MultipartBody};

struct SessionSlot {
    session: UploadSession,
    cancel: CancellationToken,
    chunk_in_flight: bool,
}

/// Clears a session's in-flight flag even if the sending future is dropped.
struct InFlightGuard<'a> {
    sessions: &'a Mutex<HashMap<String, SessionSlot>>,
    session_id: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.sessions.lock().get_mut(self.session_id) {
            slot.chunk_in_flight = false;
        }
    }
}

/// Chunked upload session manager.
///
/// Each session is driven sequentially; independent sessions may run
/// concurrently on one manager.
pub struct UploadManager {
    client: Arc<ApiClient>,
    chunk_size: u64,
    sessions: Mutex<HashMap<String, SessionSlot>>,
}

impl UploadManager {
    /// Manager using the client's configured chunk size.
    pub fn new(client: Arc<ApiClient>) -> Self {
        let chunk_size = client.config().chunk_size_bytes;
        Self { client, chunk_size, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Open a server-side session.
    ///
    /// # Errors
    /// Whatever the start call fails with, e.g. a 4xx when the server
    /// rejects the upload for quota reasons.
    #[instrument(skip(self), fields(filename = %filename))]
    pub async fn start(
        &self,
        filename: &str,
        total_size: u64,
        upload_type: UploadType,
    ) -> Result<UploadSession, ApiError> {
        let body = StartUploadRequest { filename: filename.to_string(), total_size, upload_type };
        let opened: StartUploadResponse = self.client.post(UPLOAD_START_PATH, &body).await?;

        let mut session = UploadSession::new(
            opened.session_id,
            filename,
            total_size,
            upload_type,
            self.chunk_size,
        );
        session.status = UploadStatus::Uploading;

        info!(
            session_id = %session.session_id,
            total_size,
            total_chunks = session.total_chunks(),
            "upload session opened"
        );

        self.sessions.lock().insert(
            session.session_id.clone(),
            SessionSlot {
                session: session.clone(),
                cancel: CancellationToken::new(),
                chunk_in_flight: false,
            },
        );
        Ok(session)
    }

    /// Send chunk `index` and record the server's acknowledgement.
    ///
    /// `index` must be the session's next expected chunk and `bytes` exactly
    /// that chunk's byte range. A `Failed` session may be resumed this way.
    ///
    /// # Errors
    /// - [`ApiError::UploadSession`] for protocol violations or a failed
    ///   chunk (the session is then `Failed`)
    /// - [`ApiError::Cancelled`] if the session was cancelled; a response
    ///   arriving after cancellation is discarded
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload_chunk(
        &self,
        session_id: &str,
        index: u64,
        bytes: &[u8],
    ) -> Result<UploadProgress, ApiError> {
        let cancel = self.begin_chunk(session_id, index, bytes.len() as u64)?;
        let guard = InFlightGuard { sessions: &self.sessions, session_id };

        let body = MultipartBody::new()
            .text("sessionId", session_id)
            .text("chunkIndex", index.to_string())
            .file("chunk", format!("{session_id}.part{index}"), bytes.to_vec());
        let request = ApiRequest::post(UPLOAD_CHUNK_PATH).multipart(body);
        let result: Result<ChunkUploadResponse, ApiError> = self.client.send(&request).await;

        drop(guard);
        let mut sessions = self.sessions.lock();
        let slot = match sessions.get_mut(session_id) {
            Some(slot) if !cancel.is_cancelled() => slot,
            _ => {
                debug!(session_id, index, "discarding chunk result for cancelled session");
                return Err(ApiError::Cancelled);
            }
        };

        match result {
            Ok(ack) => {
                slot.session
                    .record_chunk_ack(index, ack.progress)
                    .map_err(|err| ApiError::upload(session_id, err.to_string()))?;
                debug!(
                    session_id,
                    index,
                    uploaded_bytes = slot.session.uploaded_bytes,
                    progress = slot.session.progress_percent,
                    "chunk acknowledged"
                );
                Ok(slot.session.progress(index))
            }
            Err(err) => {
                slot.session.status = UploadStatus::Failed;
                warn!(
                    session_id,
                    index,
                    acknowledged = slot.session.next_chunk_index,
                    error = %err,
                    "chunk upload failed"
                );
                Err(ApiError::upload(session_id, format!("chunk {index} failed: {err}")))
            }
        }
    }

    /// Upload every chunk not yet acknowledged, in order.
    ///
    /// `data` is the whole payload; chunks already acknowledged are skipped.
    /// One [`UploadProgress`] is sent on `progress` per acknowledged chunk.
    /// Cancellation is checked before each chunk.
    ///
    /// # Errors
    /// As [`upload_chunk`](Self::upload_chunk); additionally
    /// [`ApiError::UploadSession`] if `data` does not match the session size.
    #[instrument(skip(self, data, progress), fields(len = data.len()))]
    pub async fn upload_remaining(
        &self,
        session_id: &str,
        data: &[u8],
        progress: Option<&UnboundedSender<UploadProgress>>,
    ) -> Result<UploadSession, ApiError> {
        let (snapshot, cancel) = {
            let sessions = self.sessions.lock();
            let slot = sessions
                .get(session_id)
                .ok_or_else(|| ApiError::upload(session_id, "unknown session"))?;
            (slot.session.clone(), slot.cancel.clone())
        };

        if data.len() as u64 != snapshot.total_size {
            return Err(ApiError::upload(
                session_id,
                format!("payload is {} bytes, session expects {}", data.len(), snapshot.total_size),
            ));
        }

        for index in snapshot.next_chunk_index..snapshot.total_chunks() {
            if cancel.is_cancelled() {
                info!(session_id, index, "upload cancelled before chunk");
                return Err(ApiError::Cancelled);
            }

            let range = snapshot.chunk_range(index);
            let chunk = &data[range.start as usize..range.end as usize];
            let event = self.upload_chunk(session_id, index, chunk).await?;

            if let Some(progress) = progress {
                // a dropped receiver only means nobody is watching
                let _ = progress.send(event);
            }
        }

        self.get_progress(session_id).ok_or(ApiError::Cancelled)
    }

    /// Finalize a session whose chunks are all acknowledged.
    ///
    /// # Errors
    /// [`ApiError::UploadSession`] if chunks are outstanding or the server
    /// rejects completion (the session is then `Failed` and may be
    /// completed again).
    #[instrument(skip(self))]
    pub async fn complete(&self, session_id: &str) -> Result<MediaDescriptor, ApiError> {
        let upload_type = {
            let sessions = self.sessions.lock();
            let slot = sessions
                .get(session_id)
                .ok_or_else(|| ApiError::upload(session_id, "unknown session"))?;
            let session = &slot.session;
            if !matches!(session.status, UploadStatus::Uploading | UploadStatus::Failed) {
                return Err(ApiError::upload(
                    session_id,
                    format!("cannot complete a {} session", session.status),
                ));
            }
            if slot.chunk_in_flight || !session.is_fully_acknowledged() {
                return Err(ApiError::upload(
                    session_id,
                    format!(
                        "{} of {} chunks acknowledged",
                        session.next_chunk_index,
                        session.total_chunks()
                    ),
                ));
            }
            session.upload_type
        };

        let body = CompleteUploadRequest { session_id: session_id.to_string(), upload_type };
        let result: Result<MediaDescriptor, ApiError> =
            self.client.post(UPLOAD_COMPLETE_PATH, &body).await;

        let mut sessions = self.sessions.lock();
        match result {
            Ok(media) => {
                if let Some(mut slot) = sessions.remove(session_id) {
                    if let Err(err) = slot.session.mark_completed() {
                        warn!(session_id, error = %err, "completed session had inconsistent state");
                    }
                    info!(
                        session_id,
                        status = %slot.session.status,
                        media_id = ?media.id,
                        "upload completed"
                    );
                }
                Ok(media)
            }
            Err(err) => {
                if let Some(slot) = sessions.get_mut(session_id) {
                    slot.session.status = UploadStatus::Failed;
                }
                warn!(session_id, error = %err, "upload completion failed");
                Err(ApiError::upload(session_id, format!("completion failed: {err}")))
            }
        }
    }

    /// Cancel a session. Never fails.
    ///
    /// No further chunks are issued; a chunk already on the wire settles and
    /// its result is dropped. The server-side delete is best effort.
    /// Returns the final local state, `None` for an unknown session.
    #[instrument(skip(self))]
    pub async fn cancel(&self, session_id: &str) -> Option<UploadSession> {
        let removed = self.sessions.lock().remove(session_id);
        let Some(slot) = removed else {
            debug!(session_id, "cancel requested for unknown session");
            return None;
        };
        slot.cancel.cancel();

        let mut session = slot.session;
        session.status = UploadStatus::Cancelled;

        let request = ApiRequest::delete(format!("{UPLOAD_SESSION_PATH}/{session_id}"));
        match self.client.execute(&request).await {
            Ok(_) => info!(session_id, "upload cancelled"),
            Err(err) => warn!(session_id, error = %err, "server-side upload cancel failed"),
        }
        Some(session)
    }

    /// Snapshot of a live session.
    pub fn get_progress(&self, session_id: &str) -> Option<UploadSession> {
        self.sessions.lock().get(session_id).map(|slot| slot.session.clone())
    }

    /// Start, send every chunk, and complete.
    ///
    /// # Errors
    /// The first failing step's error. After a chunk failure the session is
    /// kept so the caller can [`upload_remaining`](Self::upload_remaining)
    /// or [`cancel`](Self::cancel).
    pub async fn upload(
        &self,
        filename: &str,
        data: &[u8],
        upload_type: UploadType,
        progress: Option<&UnboundedSender<UploadProgress>>,
    ) -> Result<MediaDescriptor, ApiError> {
        let session = self.start(filename, data.len() as u64, upload_type).await?;
        self.upload_remaining(&session.session_id, data, progress).await?;
        self.complete(&session.session_id).await
    }

    /// Validate a chunk against session state and mark it in flight.
    fn begin_chunk(
        &self,
        session_id: &str,
        index: u64,
        len: u64,
    ) -> Result<CancellationToken, ApiError> {
        let mut sessions = self.sessions.lock();
        let slot = sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::upload(session_id, "unknown session"))?;

        if slot.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let session = &slot.session;
        if !matches!(session.status, UploadStatus::Uploading | UploadStatus::Failed) {
            return Err(ApiError::upload(
                session_id,
                format!("cannot upload to a {} session", session.status),
            ));
        }
        if slot.chunk_in_flight {
            return Err(ApiError::upload(session_id, "another chunk is still in flight"));
        }
        if index != session.next_chunk_index {
            return Err(ApiError::upload(
                session_id,
                format!("chunk {index} out of order, expected {}", session.next_chunk_index),
            ));
        }
        if index >= session.total_chunks() {
            return Err(ApiError::upload(session_id, format!("chunk {index} out of range")));
        }
        let range = session.chunk_range(index);
        if len != range.end - range.start {
            return Err(ApiError::upload(
                session_id,
                format!("chunk {index} has {len} bytes, expected {}", range.end - range.start),
            ));
        }

        slot.session.status = UploadStatus::Uploading;
        slot.chunk_in_flight = true;
        Ok(slot.cancel.clone())
    }
}
