//! Bounded retry with exponential backoff for transient failures.
//!
//! Only errors for which [`CoreError::is_retryable`] holds are retried;
//! everything else fails on the first attempt.
//!
//! # Example
//!
//! ```rust
//! use recipebox_runtime::retry::{RetryPolicy, retry_transient};
//! use std::time::Duration;
//!
//! # async fn example() -> recipebox_core::Result<()> {
//! let policy = RetryPolicy::new()
//!     .with_max_retries(2)
//!     .with_initial_delay(Duration::from_millis(50));
//!
//! let sent = retry_transient(&policy, "deliver", || async { Ok(42) }).await?;
//! assert_eq!(sent, 42);
//! # Ok(())
//! # }
//! ```

use recipebox_core::{CoreError, Result};
use std::future::Future;
use std::time::Duration;

/// Backoff settings.
///
/// # Default Values
///
/// - `max_retries`: 2
/// - `initial_delay`: 200ms
/// - `max_delay`: 5 seconds
/// - `multiplier`: 2 (delay doubles each retry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Set the number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the cap on any single delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt` (zero-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Run `operation`, retrying retryable errors according to `policy`.
///
/// `what` names the operation in logs.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the
/// retries are exhausted.
pub async fn retry_transient<F, Fut, T>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation = what, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !CoreError::is_retryable(&err) => return Err(err),
            Err(err) if attempt >= policy.max_retries => {
                tracing::error!(operation = what, attempt, error = %err, "Giving up after retries");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    operation = what,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
