//! Request orchestration for the REST backend
//!
//! This module layers the client protocols on top of the transport:
//!
//! - [`client`]: transport + token lifecycle + retry, with a response cache
//!   in front of reads
//! - [`upload`]: resumable chunked uploads
//! - [`pagination`]: incremental list loading
//! - [`sync`]: checkpointed delta reconciliation
//!
//! The three protocols share one [`ApiClient`] but not each other.

pub mod auth;
pub mod client;
pub mod errors;
pub mod pagination;
pub mod request;
pub mod sync;
pub mod upload;

pub use auth::{HttpTokenRefresher, TokenGeneration, TokenManager, TokenRefresher};
pub use client::{ApiClient, ApiClientBuilder};
pub use errors::{ApiError, ApiErrorCategory, ErrorReport};
pub use pagination::{EndpointSource, LoadOutcome, PageSource, Paginator, SkipReason};
pub use request::{ApiRequest, MultipartBody, RequestBody};
pub use sync::SyncReconciler;
pub use upload::UploadManager;
