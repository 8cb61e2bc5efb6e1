//! Resilience patterns for transient failures
//!
//! - **Retry Logic**: bounded exponential backoff driven by
//!   [`ErrorClassification`](crate::error::ErrorClassification)
//!
//! The per-request [`RetryContext`] also carries the one-bit
//! "auth refresh already used" flag. Backoff retries never read or reset it;
//! it is there so the authorization layer can prove a request is replayed
//! after a token refresh at most once.

pub mod retry;

pub use retry::{RetryContext, RetryError, RetryPolicy};
