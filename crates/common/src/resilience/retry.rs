//! Bounded exponential-backoff retry
//!
//! Delay before attempt `n` (`n >= 1`, the first retry) is
//! `base_delay * 2^n`, optionally capped. Attempt `0` runs immediately.
//! Only failures classified as retryable are retried; anything else is
//! surfaced on the spot.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ErrorClassification;

/// Largest exponent applied to the base delay.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Errors surfaced by [`RetryPolicy::execute`]
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The operation failed with a non-retryable error
    #[error("{0}")]
    Terminal(E),
}

impl<E> RetryError<E> {
    /// The underlying error, whichever way the loop ended.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Terminal(err) => err,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Per-request retry state.
///
/// Created for one outbound call and dropped when it settles. Atomics let
/// the retry loop and the attempt closure share it by reference.
#[derive(Debug)]
pub struct RetryContext {
    attempt: AtomicU32,
    max_attempts: u32,
    refresh_used: AtomicBool,
}

impl RetryContext {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: AtomicU32::new(0),
            max_attempts: max_attempts.max(1),
            refresh_used: AtomicBool::new(false),
        }
    }

    /// Zero-based index of the attempt currently running.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn refresh_used(&self) -> bool {
        self.refresh_used.load(Ordering::SeqCst)
    }

    /// Claim the single refresh-and-replay allowed for this request.
    ///
    /// Returns `true` exactly once per context.
    pub fn try_consume_refresh(&self) -> bool {
        !self.refresh_used.swap(true, Ordering::SeqCst)
    }
}

/// Retry loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the initial try; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, max_delay: None }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fresh context for one logical request under this policy.
    pub fn context(&self) -> RetryContext {
        RetryContext::new(self.max_attempts)
    }

    /// Delay slept before attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 1u32 << attempt.min(MAX_BACKOFF_SHIFT);
        let delay = self.base_delay.saturating_mul(multiplier);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` is invoked once per attempt and must rebuild the same logical
    /// request each time.
    ///
    /// # Errors
    /// - [`RetryError::Terminal`] for the first non-retryable failure
    /// - [`RetryError::Exhausted`] carrying the last failure once
    ///   `ctx.max_attempts()` attempts have failed
    pub async fn execute<T, E, F, Fut>(
        &self,
        ctx: &RetryContext,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClassification + fmt::Display,
    {
        let max_attempts = ctx.max_attempts();
        let mut attempt = 0u32;

        loop {
            ctx.attempt.store(attempt, Ordering::SeqCst);

            if attempt > 0 {
                let delay = self.delay_for(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(RetryError::Terminal(err)),
                Err(err) if attempt + 1 >= max_attempts => {
                    warn!(attempts = max_attempts, error = %err, "retries exhausted");
                    return Err(RetryError::Exhausted { attempts: max_attempts, last: err });
                }
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "retryable failure"
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// [`execute`](Self::execute) with a context created for this call.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorClassification + fmt::Display,
    {
        let ctx = self.context();
        self.execute(&ctx, op).await
    }
}
