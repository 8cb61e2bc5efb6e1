//! Bearer token lifecycle
//!
//! [`TokenManager`] holds the current access token and coordinates refresh
//! when the server rejects it. Concurrent 401s collapse into one refresh:
//! every request records the token *generation* it was sent with, and a
//! caller entering the refresh path after someone else already replaced
//! that generation simply picks up the new token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder};
use tidewire_common::resilience::RetryPolicy;
use tidewire_domain::constants::REFRESH_PATH;
use tidewire_domain::{AuthToken, RefreshRequest, TokenPair};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::errors::ApiError;
use crate::http::HttpClient;

/// Exchanges a refresh token for a new token pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

/// Refresher backed by `POST /auth/refresh`.
pub struct HttpTokenRefresher {
    http: Arc<HttpClient>,
    url: String,
    retry: RetryPolicy,
}

impl HttpTokenRefresher {
    pub fn new(http: Arc<HttpClient>, base_url: &str, retry: RetryPolicy) -> Self {
        Self { http, url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH), retry }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let body = RefreshRequest { refresh_token: refresh_token.to_string() };
        let body = &body;

        let response = self
            .retry
            .run(move || async move {
                let response =
                    self.http.send(self.http.request(Method::POST, &self.url).json(&body)).await?;
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let text = response.text().await.unwrap_or_default();
                Err(ApiError::from_status(status, &self.url, &text))
            })
            .await
            .map_err(ApiError::from)?;

        response.json::<TokenPair>().await.map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<AuthToken>,
    refresh_token: Option<String>,
    generation: u64,
}

/// Token generation a request was sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGeneration(u64);

/// Holder of the current bearer token.
///
/// The token slot is never held across an `.await`; only the refresh
/// path takes the async mutex.
pub struct TokenManager {
    state: RwLock<SessionState>,
    refresh_lock: Mutex<()>,
    refresher: Arc<dyn TokenRefresher>,
    refreshes: AtomicU64,
}

impl TokenManager {
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            refresh_lock: Mutex::new(()),
            refresher,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Install a token pair, e.g. after login or when restoring a persisted
    /// session.
    pub fn set_session(&self, pair: TokenPair) {
        let mut state = self.state.write();
        state.token = Some(pair.token);
        if pair.refresh_token.is_some() {
            state.refresh_token = pair.refresh_token;
        }
        state.generation += 1;
        debug!(generation = state.generation, "session installed");
    }

    /// Drop the token and refresh token.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.token = None;
        state.refresh_token = None;
        state.generation += 1;
    }

    pub fn current_token(&self) -> Option<AuthToken> {
        self.state.read().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().token.is_some()
    }

    pub fn generation(&self) -> TokenGeneration {
        TokenGeneration(self.state.read().generation)
    }

    /// Number of refresh exchanges performed so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Attach the current token, if any, as a bearer header.
    pub fn attach(&self, builder: RequestBuilder) -> (RequestBuilder, TokenGeneration) {
        let state = self.state.read();
        let generation = TokenGeneration(state.generation);
        match &state.token {
            Some(token) => (builder.bearer_auth(token.as_str()), generation),
            None => (builder, generation),
        }
    }

    /// React to a 401 for a request sent with `failed`.
    ///
    /// Returns the token to replay with. Only one refresh runs at a time;
    /// callers queued behind it reuse its outcome instead of refreshing
    /// again.
    ///
    /// # Errors
    /// [`ApiError::Auth`] when no refresh token is held or the refresh
    /// exchange fails. The stored session is cleared in both cases.
    pub async fn handle_unauthorized(
        &self,
        failed: TokenGeneration,
    ) -> Result<AuthToken, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = {
            let state = self.state.read();
            if state.generation != failed.0 {
                debug!("token already replaced, reusing it");
                return state
                    .token
                    .clone()
                    .ok_or_else(|| ApiError::Auth("session expired".to_string()));
            }
            state.refresh_token.clone()
        };

        let Some(refresh_token) = refresh_token else {
            warn!("401 received with no refresh token, clearing session");
            self.clear();
            return Err(ApiError::Auth("session expired and no refresh token is held".into()));
        };

        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match self.refresher.refresh(&refresh_token).await {
            Ok(pair) => {
                let token = pair.token.clone();
                self.set_session(pair);
                info!("access token refreshed");
                Ok(token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing session");
                self.clear();
                Err(ApiError::Auth(format!("token refresh failed: {err}")))
            }
        }
    }
}
