//! Runtime building blocks shared across Tidewire crates.
//!
//! Nothing here performs network I/O:
//! - [`cache`]: keyed TTL store for read responses
//! - [`resilience`]: bounded exponential-backoff retry
//! - [`error`]: the classification seam the retry loop consults
//! - [`time`]: clock abstraction so expiry is testable without sleeping

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod error;
pub mod resilience;
pub mod time;

pub use cache::{CacheStats, TtlCache};
pub use error::{ErrorClassification, ErrorSeverity};
pub use resilience::{RetryContext, RetryError, RetryPolicy};
pub use time::{Clock, MockClock, SystemClock};
