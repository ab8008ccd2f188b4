//! Tunables for the runtime services.
//!
//! All structs have defaults matching production behaviour and `with_*`
//! builders for tests and for the server's environment loader.

use recipebox_core::cursor::DEFAULT_FUTURE_GRACE;
use recipebox_core::pagination::PageLimits;
use std::time::Duration;

pub use crate::retry::RetryPolicy;

pub use crate::scheduler::SchedulerConfig;

/// Default lifetime of a one-time verification code.
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cursor decoding and page size settings shared by the listing services.
#[derive(Debug, Clone, Copy)]
pub struct CursorConfig {
    /// How far into the future a timestamp cursor may point
    pub future_grace: chrono::Duration,
    /// Default and maximum page sizes
    pub limits: PageLimits,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            future_grace: DEFAULT_FUTURE_GRACE,
            limits: PageLimits::default(),
        }
    }
}

impl CursorConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the future grace window for timestamp cursors.
    #[must_use]
    pub const fn with_future_grace(mut self, grace: chrono::Duration) -> Self {
        self.future_grace = grace;
        self
    }

    /// Set the page limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Email verification settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationConfig {
    /// How long a one-time code stays valid
    pub code_ttl: Duration,
    /// Backoff for transient delivery failures
    pub delivery_retry: RetryPolicy,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl: DEFAULT_CODE_TTL,
            delivery_retry: RetryPolicy::default(),
        }
    }
}

impl VerificationConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the code lifetime.
    #[must_use]
    pub const fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    /// Set the delivery retry policy.
    #[must_use]
    pub const fn with_delivery_retry(mut self, policy: RetryPolicy) -> Self {
        self.delivery_retry = policy;
        self
    }

    /// Code lifetime as a `chrono` duration, saturating on overflow.
    #[must_use]
    pub fn code_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.code_ttl).unwrap_or(chrono::Duration::MAX)
    }
}
