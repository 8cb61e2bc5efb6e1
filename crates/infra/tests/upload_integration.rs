//! Integration tests for chunked uploads over HTTP
//!
//! **Purpose**: drive [`UploadManager`] against a mock backend end to end.
//!
//! **Coverage**:
//! - A 3 MiB payload at 1 MiB chunks produces exactly three ordered chunk
//!   calls with monotonically increasing progress
//! - A failed chunk leaves the session resumable from the next index
//! - Cancel stops further chunk calls and never fails
//! - Cancelling while a chunk is on the wire discards that chunk's result

#[path = "support.rs"]
mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tidewire_domain::{UploadStatus, UploadType};
use tidewire_infra::{ApiError, UploadManager};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{client_for, client_with, mount_upload_start, ChunkAcks};

const MIB: usize = 1024 * 1024;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn three_mib_upload_sends_three_ordered_chunks() {
    let server = MockServer::start().await;
    mount_upload_start(&server, "sess-3").await;

    let (acks, chunk_calls) = ChunkAcks::new(3);
    Mock::given(method("POST"))
        .and(path("/upload/chunk"))
        .respond_with(acks)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "media-9",
            "url": "https://cdn.example.com/media-9.mp4",
            "durationSecs": 12
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = UploadManager::new(client_for(&server));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let media = manager
        .upload("clip.mp4", &payload(3 * MIB), UploadType::Video, Some(&tx))
        .await
        .expect("upload should succeed");
    drop(tx);

    assert_eq!(media.id.as_deref(), Some("media-9"));
    assert_eq!(media.metadata.get("durationSecs"), Some(&json!(12)));
    assert_eq!(chunk_calls.load(Ordering::SeqCst), 3);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    let indexes: Vec<u64> = events.iter().map(|e| e.chunk_index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert!(events.windows(2).all(|w| w[0].percent < w[1].percent));
    assert!(events.windows(2).all(|w| w[0].uploaded_bytes < w[1].uploaded_bytes));
    assert_eq!(events.last().map(|e| e.uploaded_bytes), Some(3 * MIB as u64));

    // Completed sessions are released
    assert!(manager.get_progress("sess-3").is_none());
}

#[tokio::test]
async fn failed_chunk_resumes_from_next_index() {
    let server = MockServer::start().await;
    mount_upload_start(&server, "sess-r").await;

    Mock::given(method("POST"))
        .and(path("/upload/chunk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "progress": 50.0 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/chunk"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "bad chunk" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/chunk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "progress": 100.0 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-r" })))
        .mount(&server)
        .await;

    let client = client_with(&server, |config| config.chunk_size_bytes = 4);
    let manager = UploadManager::new(client);
    let data = payload(8);

    let session = manager.start("notes.txt", 8, UploadType::Document).await.unwrap();
    let err = manager.upload_remaining(&session.session_id, &data, None).await.unwrap_err();
    assert!(matches!(err, ApiError::UploadSession { .. }));

    let failed = manager.get_progress(&session.session_id).unwrap();
    assert_eq!(failed.status, UploadStatus::Failed);
    assert_eq!(failed.next_chunk_index, 1);
    assert_eq!(failed.uploaded_bytes, 4);

    let resumed = manager.upload_remaining(&session.session_id, &data, None).await.unwrap();
    assert_eq!(resumed.next_chunk_index, 2);
    assert!(resumed.is_fully_acknowledged());

    let media = manager.complete(&session.session_id).await.unwrap();
    assert_eq!(media.id.as_deref(), Some("media-r"));
}

#[tokio::test]
async fn cancel_stops_upload_and_tolerates_server_failure() {
    let server = MockServer::start().await;
    mount_upload_start(&server, "sess-c").await;

    Mock::given(method("POST"))
        .and(path("/upload/chunk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "progress": 25.0 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/upload/sess-c$"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, |config| config.chunk_size_bytes = 4);
    let manager = UploadManager::new(client);
    let data = payload(16);

    let session = manager.start("song.mp3", 16, UploadType::Audio).await.unwrap();
    manager.upload_chunk(&session.session_id, 0, &data[0..4]).await.unwrap();

    let cancelled = manager.cancel(&session.session_id).await.expect("session was live");
    assert_eq!(cancelled.status, UploadStatus::Cancelled);
    assert_eq!(cancelled.uploaded_bytes, 4);

    let err = manager.upload_remaining(&session.session_id, &data, None).await.unwrap_err();
    assert!(matches!(err, ApiError::UploadSession { .. }));

    // Second cancel of the same session is a quiet no-op
    assert!(manager.cancel(&session.session_id).await.is_none());
}

#[tokio::test]
async fn cancel_during_in_flight_chunk_discards_its_result() {
    let server = MockServer::start().await;
    mount_upload_start(&server, "sess-m").await;

    Mock::given(method("POST"))
        .and(path("/upload/chunk"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "progress": 33.0 }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/upload/sess-m"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, |config| config.chunk_size_bytes = 4);
    let manager = Arc::new(UploadManager::new(client));
    let session = manager.start("burst.bin", 12, UploadType::Document).await.unwrap();

    let uploading = {
        let manager = Arc::clone(&manager);
        let session_id = session.session_id.clone();
        tokio::spawn(async move { manager.upload_remaining(&session_id, &payload(12), None).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let cancelled = manager.cancel(&session.session_id).await.expect("session was live");
    assert_eq!(cancelled.status, UploadStatus::Cancelled);
    assert_eq!(cancelled.uploaded_bytes, 0);

    let result = uploading.await.expect("upload task panicked");
    assert!(matches!(result, Err(ApiError::Cancelled)), "got {result:?}");
    assert!(manager.get_progress(&session.session_id).is_none());

    let chunk_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/upload/chunk")
        .count();
    assert_eq!(chunk_calls, 1);
}
