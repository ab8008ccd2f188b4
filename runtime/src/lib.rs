//! # Recipebox Runtime
//!
//! The imperative shell around `recipebox-core`: everything here talks to the
//! store traits and the notifier.
//!
//! ## Components
//!
//! - **[`aggregate::RatingAggregateMaintainer`]**: recomputes a recipe's
//!   rating count and average from its active ratings
//! - **[`scheduler::ReconciliationScheduler`]**: periodic sweep that repairs
//!   aggregates left stale by failed or interleaved writes
//! - **[`ratings::RatingService`]**: rating writes and rating listings
//! - **[`collections::CollectionService`]**, **[`follows::FollowService`]**,
//!   **[`categories::CategoryService`]**: the other keyset listings
//! - **[`verification`]**: one-time email verification codes driven by events
//! - **[`notifier`]**: console and SMTP delivery of codes
//! - **[`retry`]**: bounded backoff around transient delivery failures
//!
//! ## Example
//!
//! ```ignore
//! use recipebox_runtime::{aggregate::RatingAggregateMaintainer, scheduler::*};
//! use std::sync::Arc;
//!
//! let maintainer = Arc::new(RatingAggregateMaintainer::new(Arc::clone(&store)));
//! let scheduler = ReconciliationScheduler::new(maintainer, SchedulerConfig::default());
//! scheduler.start()?;
//! // ...
//! scheduler.stop().await;
//! ```

/// Rating aggregate recomputation
pub mod aggregate;

/// Category listing
pub mod categories;

/// Collection membership and listing
pub mod collections;

/// Configuration structs
pub mod config;

/// Follow relationships and follower listings
pub mod follows;

/// Prometheus metrics for observability
pub mod metrics;

/// One-time code delivery
pub mod notifier;

/// Rating writes and listings
pub mod ratings;

/// Backoff for transient failures
pub mod retry;

/// Background reconciliation of rating aggregates
pub mod scheduler;

/// Email verification flow
pub mod verification;

pub use aggregate::RatingAggregateMaintainer;
pub use scheduler::{ReconciliationScheduler, SchedulerError, SchedulerState, SweepReport};
