//! API client composing transport, token lifecycle, retry and cache
//!
//! Every call goes through the same stack: one [`RetryContext`] per logical
//! request, one correlation id per logical request, and within each attempt
//! at most one refresh-and-replay on 401.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tidewire_common::cache::{cache_key, TtlCache};
use tidewire_common::resilience::{RetryContext, RetryPolicy};
use tidewire_domain::constants::{HEADER_REQUEST_ID, HEALTH_PATH, LOGIN_PATH};
use tidewire_domain::{ClientConfig, Credentials, TokenPair};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::auth::{HttpTokenRefresher, TokenGeneration, TokenManager, TokenRefresher};
use super::errors::ApiError;
use super::request::ApiRequest;
use crate::errors::classify_decode_error;
use crate::http::HttpClient;

/// Resilient API client for one backend.
///
/// Owns its token slot and response cache; two clients never share state.
pub struct ApiClient {
    http: Arc<HttpClient>,
    tokens: Arc<TokenManager>,
    retry: RetryPolicy,
    cache: TtlCache<serde_json::Value>,
    config: ClientConfig,
    base_url: String,
}

impl ApiClient {
    /// Create a client that refreshes tokens through `POST /auth/refresh`.
    ///
    /// # Errors
    /// [`ApiError::Config`] if the configuration is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn cache(&self) -> &TtlCache<serde_json::Value> {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute `request` through retry and auth, returning the successful
    /// response.
    ///
    /// # Errors
    /// - Terminal errors (4xx, unrecoverable 401, decode) as-is
    /// - [`ApiError::RetriesExhausted`] once transient failures use up every
    ///   attempt
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let ctx = self.retry.context();

        self.retry
            .execute(&ctx, || self.attempt(request, &request_id, &ctx))
            .await
            .map_err(ApiError::from)
    }

    /// Execute `request` and decode the JSON body.
    ///
    /// # Errors
    /// See [`execute`](Self::execute); additionally [`ApiError::Decode`]
    /// when the body does not match `R`.
    pub async fn send<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R, ApiError> {
        let url = self.url(&request.path);
        let response = self.execute(request).await?;
        decode_response(response, &url).await
    }

    #[instrument(skip(self, query), fields(path = %path))]
    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<R, ApiError> {
        self.send(&with_query(ApiRequest::get(path), query)).await
    }

    /// GET through the response cache.
    ///
    /// A valid entry short-circuits the network entirely. `ttl` of `None`
    /// uses the configured default.
    #[instrument(skip(self, query, ttl), fields(path = %path))]
    pub async fn get_cached<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> Result<R, ApiError> {
        let key = cache_key(path, query);

        if let Some(value) = self.cache.get(&key) {
            debug!(key = %key, "cache hit");
            return serde_json::from_value(value)
                .map_err(|err| classify_decode_error(&err, &self.url(path)));
        }

        let value: serde_json::Value = self.get(path, query).await?;
        let result = serde_json::from_value(value.clone())
            .map_err(|err| classify_decode_error(&err, &self.url(path)))?;
        self.cache.put_with_ttl(key, value, ttl.unwrap_or_else(|| self.cache.default_ttl()));
        Ok(result)
    }

    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, ApiError> {
        self.send(&ApiRequest::post(path).json(body)?).await
    }

    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn put<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, ApiError> {
        self.send(&ApiRequest::new(Method::PUT, path).json(body)?).await
    }

    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.send(&ApiRequest::delete(path)).await
    }

    /// Exchange credentials for a session and install it.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).anonymous().json(credentials)?;
        let pair: TokenPair = self.send(&request).await?;
        self.tokens.set_session(pair);
        info!("logged in");
        Ok(())
    }

    /// Drop the session and every cached read.
    pub fn logout(&self) {
        self.tokens.clear();
        self.cache.clear();
        info!("logged out");
    }

    /// Single unauthenticated probe of `/health`, never retried.
    ///
    /// # Errors
    /// Transport failures only; a non-success status yields `Ok(false)`.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<bool, ApiError> {
        let url = self.url(HEALTH_PATH);
        match self.http.send(self.http.request(Method::GET, &url)).await {
            Ok(response) if response.status().is_success() => {
                info!("API is healthy");
                Ok(true)
            }
            Ok(response) => {
                warn!(status = %response.status(), "API returned non-success status");
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, "Health check failed");
                Err(err)
            }
        }
    }

    /// One attempt: send, and on 401 refresh once and replay.
    async fn attempt(
        &self,
        request: &ApiRequest,
        request_id: &str,
        ctx: &RetryContext,
    ) -> Result<Response, ApiError> {
        let url = self.url(&request.path);
        debug!(
            method = %request.method,
            url = %url,
            attempt = ctx.attempt() + 1,
            request_id,
            "API request attempt"
        );

        let (builder, generation) = self.prepare(request, &url, request_id)?;
        let response = self.http.send(builder).await?;

        if response.status() != StatusCode::UNAUTHORIZED || !request.authenticated {
            return check_status(response, &url).await;
        }

        if !ctx.try_consume_refresh() {
            return Err(ApiError::Auth(format!("{url} rejected credentials after token refresh")));
        }

        debug!(url = %url, request_id, "401 received, refreshing token");
        self.tokens.handle_unauthorized(generation).await?;

        let (builder, _) = self.prepare(request, &url, request_id)?;
        let response = self.http.send(builder).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Auth(format!("{url} rejected the refreshed token")));
        }
        check_status(response, &url).await
    }

    fn prepare(
        &self,
        request: &ApiRequest,
        url: &str,
        request_id: &str,
    ) -> Result<(reqwest::RequestBuilder, TokenGeneration), ApiError> {
        let builder = self.http.request(request.method.clone(), url);
        let builder = match HeaderValue::from_str(request_id) {
            Ok(value) => builder.header(HEADER_REQUEST_ID, value),
            Err(_) => builder,
        };
        let builder = request.apply(builder)?;

        if request.authenticated {
            Ok(self.tokens.attach(builder))
        } else {
            Ok((builder, self.tokens.generation()))
        }
    }
}

fn with_query(mut request: ApiRequest, query: &[(&str, String)]) -> ApiRequest {
    for (key, value) in query {
        request = request.query(*key, value);
    }
    request
}

async fn check_status(response: Response, url: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status, url, &body))
}

/// Decode a successful response, treating 204/205 and empty bodies as
/// JSON `null`.
async fn decode_response<R: DeserializeOwned>(response: Response, url: &str) -> Result<R, ApiError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(true, |v| v.contains("json"));

    let bytes = response
        .bytes()
        .await
        .map_err(|err| ApiError::Network(format!("{url}: failed to read body: {err}")))?;

    let no_content = status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
        || bytes.iter().all(u8::is_ascii_whitespace);
    if no_content {
        return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
            ApiError::Decode(format!(
                "{url} returned no content ({}), but the response type requires a body",
                status.as_u16()
            ))
        });
    }

    serde_json::from_slice(&bytes).map_err(|err| {
        if is_json {
            classify_decode_error(&err, url)
        } else {
            ApiError::Decode(format!("{url} returned a non-JSON body: {err}"))
        }
    })
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    http: Option<HttpClient>,
}

impl ApiClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default `POST /auth/refresh` exchange.
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// # Errors
    /// [`ApiError::Config`] for an invalid configuration or base URL.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|err| ApiError::Config(format!("invalid base_url {}: {err}", config.base_url)))?;
        let base_url = base_url.as_str().trim_end_matches('/').to_string();

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = HttpClient::builder().timeout(config.timeout());
                if let Some(agent) = &config.user_agent {
                    builder = builder.user_agent(agent.clone());
                }
                builder.build()?
            }
        };
        let http = Arc::new(http);

        let retry = RetryPolicy::new(config.max_attempts, config.base_backoff());
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(http.clone(), &base_url, retry.clone()))
        });

        Ok(ApiClient {
            http,
            tokens: Arc::new(TokenManager::new(refresher)),
            retry,
            cache: TtlCache::new(config.cache_ttl(), config.cache_max_entries),
            config,
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tidewire_domain::AuthToken;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> ApiClient {
        let config = ClientConfig {
            base_backoff_ms: 1,
            ..ClientConfig::with_base_url(server.uri())
        };
        ApiClient::new(config).unwrap()
    }

    fn install_token(client: &ApiClient, token: &str) {
        client.tokens().set_session(TokenPair {
            token: AuthToken::new(token),
            refresh_token: Some("refresh-1".into()),
        });
    }

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_and_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header_exists(HEADER_REQUEST_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        install_token(&client, "test-token");

        let result: TestResponse = client.get("/test", &[]).await.unwrap();
        assert_eq!(result.message, "ok");
    }

    #[tokio::test]
    async fn test_get_without_token_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public"))
            .respond_with(|req: &Request| {
                if req.headers.contains_key("authorization") {
                    ResponseTemplate::new(400)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"message": "anon"}))
                }
            })
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: TestResponse = client.get("/public", &[]).await.unwrap();
        assert_eq!(result.message, "anon");
    }

    #[tokio::test]
    async fn test_retries_server_errors_with_same_request_id() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_ids = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (counter, ids) = (calls.clone(), seen_ids.clone());

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(move |req: &Request| {
                ids.lock().push(req.headers.get(HEADER_REQUEST_ID).cloned());
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"message": "finally"}))
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: TestResponse = client.get("/flaky", &[]).await.unwrap();

        assert_eq!(result.message, "finally");
        let ids = seen_ids.lock();
        assert_eq!(ids.len(), 3);
        assert!(ids[0].is_some());
        assert!(ids.iter().all(|id| id == &ids[0]));
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get::<TestResponse>("/down", &[]).await.unwrap_err();

        match err {
            ApiError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ApiError::Server { status: 500, .. }));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"message": "title required"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.post::<_, TestResponse>("/posts", &json!({})).await.unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert!(err.to_string().contains("title required"));
    }

    #[tokio::test]
    async fn test_refresh_and_replay_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("Authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("Authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "me"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        install_token(&client, "stale");

        let result: TestResponse = client.get("/me", &[]).await.unwrap();
        assert_eq!(result.message, "me");
        assert_eq!(client.tokens().current_token().unwrap().as_str(), "fresh");
    }

    #[tokio::test]
    async fn test_second_401_after_refresh_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        install_token(&client, "stale");

        let err = client.get::<TestResponse>("/me", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        install_token(&client, "stale");

        let err = client.get::<TestResponse>("/me", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
        assert!(!client.tokens().is_authenticated());
    }

    #[tokio::test]
    async fn test_get_cached_skips_network_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "feed"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let query = [("page", "1".to_string())];

        let first: TestResponse = client.get_cached("/feed", &query, None).await.unwrap();
        let second: TestResponse = client.get_cached("/feed", &query, None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_get_cached_keeps_embedded_delimiters_apart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("r", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "split"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "literal"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);

        let literal: TestResponse =
            client.get_cached("/search", &[("q", "a&r=2".to_string())], None).await.unwrap();
        let split: TestResponse = client
            .get_cached("/search", &[("q", "a".to_string()), ("r", "2".to_string())], None)
            .await
            .unwrap();

        assert_eq!(literal.message, "literal");
        assert_eq!(split.message, "split");
        assert_eq!(client.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_get_cached_refetches_after_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "feed"})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let ttl = Some(Duration::from_millis(20));

        let _: TestResponse = client.get_cached("/feed", &[], ttl).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let _: TestResponse = client.get_cached("/feed", &[], ttl).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_installs_session_and_logout_clears_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "t1", "refreshToken": "r1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "p"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.login(&Credentials::new("a@example.com", "pw")).await.unwrap();
        assert_eq!(client.tokens().current_token().unwrap().as_str(), "t1");

        let _: TestResponse = client.get_cached("/profile", &[], None).await.unwrap();
        assert_eq!(client.cache().len(), 1);

        client.logout();
        assert!(!client.tokens().is_authenticated());
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_get_with_204_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/posts/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Result<(), ApiError> = client.delete("/posts/1").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get::<TestResponse>("/bad", &[]).await.unwrap_err();
        assert_eq!(err.code(), "decode");
    }

    #[tokio::test]
    async fn test_health_check_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.health_check().await.unwrap());
    }

    #[test]
    fn test_builder_rejects_invalid_base_url() {
        let result = ApiClient::new(ClientConfig::with_base_url("not a url"));
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn test_clients_do_not_share_state() {
        let a = ApiClient::new(ClientConfig::with_base_url("http://a.example")).unwrap();
        let b = ApiClient::new(ClientConfig::with_base_url("http://b.example")).unwrap();

        install_token(&a, "only-a");
        a.cache().put("k", json!(1));

        assert!(!b.tokens().is_authenticated());
        assert!(b.cache().is_empty());
    }
}
