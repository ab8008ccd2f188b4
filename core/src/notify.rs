//! Outbound notification collaborator.

use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Delivers one-time verification codes.
///
/// Dyn-compatible so the transport (SMTP or console) can be chosen at startup
/// and shared as `Arc<dyn Notifier>`.
pub trait Notifier: Send + Sync {
    /// Send `code` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the transport fails.
    fn send_one_time_code<'a>(
        &'a self,
        destination: &'a str,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
