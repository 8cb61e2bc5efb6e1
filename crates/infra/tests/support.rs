//! Shared fixtures for the infra integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tidewire_domain::{AuthToken, ClientConfig, TokenPair};
use tidewire_infra::ApiClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Client against `server` with a 1ms backoff base so retry tests stay fast.
pub fn client_for(server: &MockServer) -> Arc<ApiClient> {
    client_with(server, |_| {})
}

/// Client against `server` after applying `tweak` to the test config.
pub fn client_with(server: &MockServer, tweak: impl FnOnce(&mut ClientConfig)) -> Arc<ApiClient> {
    let mut config = ClientConfig { base_backoff_ms: 1, ..ClientConfig::with_base_url(server.uri()) };
    tweak(&mut config);
    Arc::new(ApiClient::new(config).expect("api client should build"))
}

/// Install a session as if the user had logged in earlier.
pub fn sign_in(client: &ApiClient, token: &str) {
    client.tokens().set_session(TokenPair {
        token: AuthToken::new(token),
        refresh_token: Some("refresh-token".to_string()),
    });
}

/// Mount `POST /upload/start` answering with `session_id`.
pub async fn mount_upload_start(server: &MockServer, session_id: &str) {
    Mock::given(method("POST"))
        .and(path("/upload/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sessionId": session_id })))
        .expect(1)
        .mount(server)
        .await;
}

/// Chunk responder reporting `100 * n / total` after the n-th call.
pub struct ChunkAcks {
    total: usize,
    calls: Arc<AtomicUsize>,
}

impl ChunkAcks {
    pub fn new(total: usize) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { total, calls: calls.clone() }, calls)
    }
}

impl Respond for ChunkAcks {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let progress = 100.0 * n as f64 / self.total as f64;
        ResponseTemplate::new(200).set_body_json(json!({ "progress": progress }))
    }
}

/// Value of query parameter `key` on a recorded request.
pub fn query_value(request: &Request, key: &str) -> Option<String> {
    request.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}
