//! Protocol constants
//!
//! Centralized location for the defaults shared by configuration and the
//! protocol engines.

/// Fixed chunk size for resumable uploads (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default total attempts (initial try + retries) for one logical request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 200;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default response cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Lookback window used when no sync checkpoint is held.
pub const DEFAULT_SYNC_LOOKBACK_HOURS: i64 = 24;
/// Upper bound accepted for the lookback window (one year).
pub const MAX_SYNC_LOOKBACK_HOURS: i64 = 24 * 366;

// Wire headers
pub const HEADER_REQUEST_ID: &str = "X-Request-Id";

// Endpoint paths
pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const HEALTH_PATH: &str = "/health";
pub const UPLOAD_START_PATH: &str = "/upload/start";
pub const UPLOAD_CHUNK_PATH: &str = "/upload/chunk";
pub const UPLOAD_COMPLETE_PATH: &str = "/upload/complete";
pub const UPLOAD_SESSION_PATH: &str = "/upload";
pub const SYNC_PATH: &str = "/sync";
