//! In-process publish/subscribe for write-path side effects.
//!
//! ```text
//! ┌──────────────┐  publish(event)  ┌───────────┐
//! │ write path   │─────────────────►│ EventBus  │
//! └──────────────┘                  └─────┬─────┘
//!                                         │ snapshot handlers for event.kind()
//!                                         ▼
//!                          handler 1 ──► handler 2 ──► ...   (in order)
//! ```
//!
//! # Delivery rules
//!
//! - Handlers run on the publisher's task, in subscription order.
//! - The first handler error stops dispatch and is returned to the publisher.
//!   Handlers that already ran are not rolled back.
//! - Publishing with no subscribers is a silent no-op.
//! - Subscribing is append-only and may happen while events are published. The
//!   subscription lock is released before any handler runs, so a handler may
//!   itself subscribe or publish.

use crate::error::Result;
use crate::event::{DomainEvent, EventKind};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

/// Reacts to published events.
///
/// # Dyn Compatibility
///
/// Returns `Pin<Box<dyn Future>>` instead of using `async fn` so handlers can
/// be stored as `Arc<dyn EventHandler>`.
pub trait EventHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Any error aborts dispatch of this event to later handlers.
    fn handle<'a>(
        &'a self,
        event: &'a DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

type Subscriptions = HashMap<EventKind, Vec<Arc<dyn EventHandler>>>;

/// Synchronous, ordered, fail-fast event dispatcher.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Subscriptions>,
}

impl EventBus {
    /// Create a bus with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    ///
    /// Handlers for the same kind run in the order they were registered.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        tracing::debug!(event = %kind, handler = handler.name(), "Subscribing handler");
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler subscribed to its kind.
    ///
    /// # Errors
    ///
    /// Returns the first handler error unchanged; remaining handlers are
    /// skipped.
    pub async fn publish(&self, event: DomainEvent) -> Result<()> {
        let kind = event.kind();
        let handlers = self.snapshot(kind);

        metrics::counter!("event_bus_events_published_total", "event" => kind.name()).increment(1);

        if handlers.is_empty() {
            tracing::debug!(event = %kind, "No handlers subscribed");
            return Ok(());
        }

        for handler in handlers {
            if let Err(error) = handler.handle(&event).await {
                metrics::counter!("event_bus_handler_failures_total", "event" => kind.name())
                    .increment(1);
                tracing::warn!(
                    event = %kind,
                    handler = handler.name(),
                    error = %error,
                    "Event handler failed, aborting dispatch"
                );
                return Err(error);
            }
        }
        Ok(())
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Arc<dyn EventHandler>> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscriptions = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut map = f.debug_map();
        for (kind, handlers) in subscriptions.iter() {
            map.entry(&kind.name(), &handlers.iter().map(|h| h.name()).collect::<Vec<_>>());
        }
        map.finish()
    }
}
