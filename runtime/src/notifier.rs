//! One-time code delivery.
//!
//! - [`ConsoleNotifier`] logs the code; used when no SMTP server is configured.
//! - [`SmtpNotifier`] sends a plain-text email through an SMTP relay.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use recipebox_core::notify::Notifier;
use recipebox_core::{CoreError, Result};
use std::future::Future;
use std::pin::Pin;

/// Notifier that writes codes to the log instead of sending them.
///
/// Development only: the code itself appears in the log output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Create a console notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Notifier for ConsoleNotifier {
    fn send_one_time_code<'a>(
        &'a self,
        destination: &'a str,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(to = destination, code = code, "One-time verification code (console)");
            Ok(())
        })
    }
}

/// SMTP connection and sender settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    /// SMTP relay host
    pub host: String,
    /// SMTP port (usually 587)
    pub port: u16,
    /// Authentication username
    pub username: String,
    /// Authentication password
    pub password: String,
    /// Sender address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
}

/// Notifier that emails codes through an SMTP relay.
#[derive(Clone)]
pub struct SmtpNotifier {
    settings: SmtpSettings,
    credentials: Credentials,
}

impl SmtpNotifier {
    /// Create a notifier from connection settings.
    #[must_use]
    pub fn new(settings: SmtpSettings) -> Self {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());
        Self {
            settings,
            credentials,
        }
    }

    fn build_transport(&self) -> Result<SmtpTransport> {
        let transport = SmtpTransport::relay(&self.settings.host)
            .map_err(|e| CoreError::Unavailable(format!("SMTP relay error: {e}")))?
            .port(self.settings.port)
            .credentials(self.credentials.clone())
            .build();
        Ok(transport)
    }

    fn build_message(&self, destination: &str, code: &str) -> Result<Message> {
        let from = format!("{} <{}>", self.settings.from_name, self.settings.from_email);
        Message::builder()
            .from(
                from.parse()
                    .map_err(|e| CoreError::Unavailable(format!("Invalid from address: {e}")))?,
            )
            .to(destination
                .parse()
                .map_err(|e| CoreError::Validation(format!("Invalid destination address: {e}")))?)
            .subject("Your verification code")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Your verification code is {code}.\n\nIt expires in a few minutes. If you did not request it, ignore this email.\n"
            ))
            .map_err(|e| CoreError::Unavailable(format!("Failed to build email: {e}")))
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("from_email", &self.settings.from_email)
            .finish_non_exhaustive()
    }
}

impl Notifier for SmtpNotifier {
    fn send_one_time_code<'a>(
        &'a self,
        destination: &'a str,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let email = self.build_message(destination, code)?;
            let mailer = self.build_transport()?;

            tokio::task::spawn_blocking(move || {
                mailer
                    .send(&email)
                    .map_err(|e| CoreError::Unavailable(format!("Failed to send email: {e}")))
            })
            .await
            .map_err(|e| CoreError::Unavailable(format!("Email task failed: {e}")))?
            .map(|_| ())?;

            tracing::debug!(to = destination, "Verification code emailed");
            Ok(())
        })
    }
}
