//! Error classification shared by retrying components
//!
//! Any error type that wants to travel through
//! [`RetryPolicy`](crate::resilience::RetryPolicy) tells it whether a failure
//! is transient.

use std::fmt;

/// Error classification trait for consistent retry decisions
///
/// # Example
///
/// ```rust
/// use tidewire_common::error::{ErrorClassification, ErrorSeverity};
///
/// enum FetchError {
///     Offline,
///     Rejected,
/// }
///
/// impl ErrorClassification for FetchError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, Self::Offline)
///     }
/// }
///
/// assert!(FetchError::Offline.is_retryable());
/// assert_eq!(FetchError::Rejected.severity(), ErrorSeverity::Error);
/// ```
pub trait ErrorClassification {
    /// Transient failures (transport errors, timeouts, 5xx) return `true`.
    fn is_retryable(&self) -> bool;

    /// Severity used for log level selection.
    fn severity(&self) -> ErrorSeverity {
        if self.is_retryable() {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
            Self::Critical => f.write_str("critical"),
        }
    }
}
