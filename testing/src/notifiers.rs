//! Notifier doubles.

use recipebox_core::notify::Notifier;
use recipebox_core::{CoreError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// A code handed to a [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    /// Destination address
    pub destination: String,
    /// The one-time code
    pub code: String,
}

/// Notifier that records every code instead of sending it.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<SentCode>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every code sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.read().unwrap().clone()
    }

    /// The most recent code sent to `destination`.
    #[must_use]
    pub fn last_code_for(&self, destination: &str) -> Option<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.destination == destination)
            .map(|s| s.code.clone())
    }
}

impl Notifier for RecordingNotifier {
    fn send_one_time_code<'a>(
        &'a self,
        destination: &'a str,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.sent.write().unwrap().push(SentCode {
                destination: destination.to_string(),
                code: code.to_string(),
            });
            Ok(())
        })
    }
}

/// Notifier whose every delivery fails with `Unavailable`.
///
/// Clones share the attempt counter.
#[derive(Debug, Clone, Default)]
pub struct FailingNotifier {
    attempts: Arc<AtomicUsize>,
}

impl FailingNotifier {
    /// Create a notifier with no recorded attempts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delivery attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for FailingNotifier {
    fn send_one_time_code<'a>(
        &'a self,
        _destination: &'a str,
        _code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(CoreError::Unavailable("mail relay down".to_string())) })
    }
}
