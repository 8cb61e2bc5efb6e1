//! # Tidewire Infrastructure
//!
//! Everything in Tidewire that performs I/O.
//!
//! This crate contains:
//! - The single-attempt HTTP transport
//! - Token lifecycle management with single-flight refresh
//! - The composed API client (transport + auth + retry + response cache)
//! - Chunked upload, pagination and sync protocols
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Builds on `tidewire-common` (cache, retry) and `tidewire-domain`
//!   (types, configuration)
//! - All state is owned by client instances; there are no process-wide
//!   singletons

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{
    ApiClient, ApiError, ApiErrorCategory, ApiRequest, LoadOutcome, Paginator, SyncReconciler,
    TokenManager, UploadManager,
};
pub use http::HttpClient;
pub use observability::init_tracing;
