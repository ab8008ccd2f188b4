//! # Recipebox Core
//!
//! Types and protocols for keeping recipe rating aggregates consistent.
//!
//! This crate holds everything that does not perform I/O itself:
//!
//! - **Model**: ratings, recipes, users and the entities the listings touch
//! - **Cursor codec**: opaque identifier and timestamp cursors
//! - **Pagination**: limit clamping and the over-fetch-by-one page protocol
//! - **Events**: tagged domain events and the in-process [`event_bus::EventBus`]
//! - **Stores**: the persistence traits the runtime is written against
//! - **Environment**: the injected [`environment::Clock`]
//!
//! Implementations of the store traits live in `recipebox-testing`
//! (in-memory) and `recipebox-postgres` (sqlx).

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{CoreError, Result};

pub mod cursor;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod model;
pub mod notify;
pub mod pagination;
pub mod store;

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use recipebox_core::environment::{Clock, SystemClock};
    ///
    /// let before = recipebox_core::Utc::now();
    /// assert!(SystemClock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
