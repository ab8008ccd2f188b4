//! Email verification through one-time codes.
//!
//! Registration publishes [`DomainEvent::UserRegistered`]; asking for a new
//! code publishes [`DomainEvent::VerificationRequested`]. The
//! [`EmailVerificationHandler`] reacts to both by issuing a fresh six-digit
//! code, storing it with an expiry and handing it to the [`Notifier`].
//! [`VerificationService::verify_code`] checks a submitted code against the
//! stored one.

use crate::config::VerificationConfig;
use crate::metrics::VerificationMetrics;
use crate::retry::retry_transient;
use rand::Rng;
use recipebox_core::environment::Clock;
use recipebox_core::event::{DomainEvent, EventKind};
use recipebox_core::event_bus::{EventBus, EventHandler};
use recipebox_core::model::{User, UserId};
use recipebox_core::notify::Notifier;
use recipebox_core::store::UserStore;
use recipebox_core::{CoreError, DateTime, Result, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Number of digits in a one-time code.
pub const CODE_LENGTH: usize = 6;

/// Issues one-time codes in response to registration and resend events.
pub struct EmailVerificationHandler<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: VerificationConfig,
}

impl<S> EmailVerificationHandler<S>
where
    S: UserStore + 'static,
{
    /// Create a handler.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            config,
        }
    }

    /// Subscribe this handler to every event kind it reacts to.
    pub fn register(self: Arc<Self>, bus: &EventBus) {
        bus.subscribe(EventKind::UserRegistered, Arc::clone(&self) as Arc<dyn EventHandler>);
        bus.subscribe(EventKind::VerificationRequested, self);
    }

    async fn issue_code(&self, user_id: UserId) -> Result<()> {
        let mut user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))?;

        let code = generate_code();
        user.verification_code = Some(code.clone());
        let now = self.clock.now();
        user.verification_expires_at = Some(
            now.checked_add_signed(self.config.code_ttl_chrono())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        self.store.update_verification(&user).await?;

        retry_transient(&self.config.delivery_retry, "send_one_time_code", || {
            self.notifier.send_one_time_code(&user.email, &code)
        })
        .await?;
        VerificationMetrics::record_code_sent();
        tracing::info!(user_id = %user_id, "Verification code issued");
        Ok(())
    }
}

impl<S> EventHandler for EmailVerificationHandler<S>
where
    S: UserStore + 'static,
{
    fn name(&self) -> &'static str {
        "email_verification"
    }

    fn handle<'a>(
        &'a self,
        event: &'a DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.issue_code(event.user_id()))
    }
}

/// User-facing verification operations.
pub struct VerificationService<S> {
    store: Arc<S>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

impl<S> VerificationService<S>
where
    S: UserStore,
{
    /// Create a service.
    #[must_use]
    pub fn new(store: Arc<S>, bus: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self { store, bus, clock }
    }

    /// Ask for a new code to be sent.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    /// - any error returned by a subscribed handler
    pub async fn request_code(&self, user_id: UserId) -> Result<()> {
        self.require_user(user_id).await?;
        self.bus
            .publish(DomainEvent::VerificationRequested { user_id })
            .await
    }

    /// Check a submitted code and mark the email verified on success.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    /// - `InvalidVerificationCode` if no code is outstanding or it differs
    /// - `VerificationCodeExpired` if the code matches but has expired
    /// - `Unavailable` if the store fails
    pub async fn verify_code(&self, user_id: UserId, code: &str) -> Result<()> {
        let mut user = self.require_user(user_id).await?;

        if user.verification_code.as_deref() != Some(code) {
            tracing::debug!(user_id = %user_id, "Verification code mismatch");
            return Err(CoreError::InvalidVerificationCode);
        }
        if user
            .verification_expires_at
            .is_none_or(|expires_at| self.clock.now() > expires_at)
        {
            tracing::debug!(user_id = %user_id, "Verification code expired");
            return Err(CoreError::VerificationCodeExpired);
        }

        user.email_verified = true;
        user.verification_code = None;
        user.verification_expires_at = None;
        self.store.update_verification(&user).await?;
        tracing::info!(user_id = %user_id, "Email verified");
        Ok(())
    }

    async fn require_user(&self, user_id: UserId) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id))
    }
}

fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_zero_padded_digits() {
        for _ in 0..1_000 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
