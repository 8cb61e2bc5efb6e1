//! API-specific error types
//!
//! Every failure surfaced to callers is an [`ApiError`]. The retry loop
//! consults [`ApiError::is_retryable`]; UI callers render
//! [`ApiError::report`].

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tidewire_common::error::{ErrorClassification, ErrorSeverity};
use tidewire_common::resilience::RetryError;
use tidewire_domain::TidewireError;

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCategory {
    /// 401 that could not be recovered by a token refresh
    Authentication,
    /// 5xx - retryable
    Server,
    /// 4xx other than 401 - non-retryable
    Client,
    /// Connection failures and timeouts - retryable
    Network,
    /// Chunked upload protocol violations and chunk failures
    Upload,
    /// Malformed responses and local misconfiguration - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Upload session {session_id}: {message}")]
    UploadSession { session_id: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ApiError> },
}

/// Serializable view of an error for UI layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    /// Whether trying the same operation again later may succeed.
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    /// Map a non-success HTTP status to the matching error.
    ///
    /// 401 becomes [`ApiError::Auth`]; the refresh path is handled by the
    /// caller before this is reached.
    pub fn from_status(status: StatusCode, url: &str, body: &str) -> Self {
        let detail = server_message(body);
        let message = match detail {
            Some(detail) => format!("{url} returned status {status}: {detail}"),
            None => format!("{url} returned status {status}"),
        };
        let code = status.as_u16();

        if status == StatusCode::UNAUTHORIZED {
            Self::Auth(message)
        } else if status.is_server_error() {
            Self::Server { status: code, message }
        } else if status.is_client_error() {
            Self::Client { status: code, message }
        } else {
            Self::Network(message)
        }
    }

    pub fn upload(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UploadSession { session_id: session_id.into(), message: message.into() }
    }

    /// Stable snake_case label.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Server { .. } => "server",
            Self::Client { .. } => "client",
            Self::Auth(_) => "auth",
            Self::UploadSession { .. } => "upload_session",
            Self::Config(_) => "config",
            Self::Decode(_) => "decode",
            Self::Cancelled => "cancelled",
            Self::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::Client { .. } => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::UploadSession { .. } => ApiErrorCategory::Upload,
            Self::Config(_) | Self::Decode(_) | Self::Cancelled => ApiErrorCategory::Config,
            Self::RetriesExhausted { last, .. } => last.category(),
        }
    }

    /// Whether the retry loop may try this request again.
    ///
    /// Only network failures, timeouts and 5xx responses qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::Server { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let retryable = match self {
            Self::RetriesExhausted { last, .. } => last.is_retryable(),
            other => other.is_retryable(),
        };
        ErrorReport { code: self.code(), message: self.to_string(), retryable, status: self.status() }
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        ApiError::is_retryable(self)
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled => ErrorSeverity::Info,
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. } => ErrorSeverity::Warning,
            Self::Config(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}

impl From<RetryError<ApiError>> for ApiError {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => {
                Self::RetriesExhausted { attempts, last: Box::new(last) }
            }
            RetryError::Terminal(err) => err,
        }
    }
}

impl From<TidewireError> for ApiError {
    fn from(err: TidewireError) -> Self {
        match err {
            TidewireError::Network(message) => Self::Network(message),
            TidewireError::Auth(message) => Self::Auth(message),
            TidewireError::Config(message)
            | TidewireError::InvalidInput(message)
            | TidewireError::Internal(message) => Self::Config(message),
        }
    }
}

impl From<ApiError> for TidewireError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(_) | ApiError::Timeout(_) | ApiError::Server { .. } => {
                TidewireError::Network(err.to_string())
            }
            ApiError::Auth(message) => TidewireError::Auth(message),
            ApiError::Config(message) => TidewireError::Config(message),
            ApiError::Client { .. } | ApiError::UploadSession { .. } => {
                TidewireError::InvalidInput(err.to_string())
            }
            other => TidewireError::Internal(other.to_string()),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Backends answer with `{"message": ...}` or `{"error": ...}`; anything
/// else is passed through trimmed.
fn server_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "error"] {
            if let Some(text) = json.get(field).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }
    Some(body.to_string())
}
