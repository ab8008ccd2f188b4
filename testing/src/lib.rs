//! # Recipebox Testing
//!
//! Testing utilities for the Recipebox runtime.
//!
//! This crate provides:
//! - [`InMemoryStore`]: every store trait over `HashMap`s, with failure injection
//! - Clocks: [`FixedClock`] and the movable [`ManualClock`]
//! - Notifiers: [`RecordingNotifier`] captures codes, [`FailingNotifier`] rejects them
//! - [`GatedAggregateStore`]: pauses a recompute mid-flight for lifecycle tests
//! - [`fixtures`]: builders for domain entities
//! - [`properties`]: proptest strategies
//!
//! ## Example
//!
//! ```
//! use recipebox_testing::{InMemoryStore, fixtures, test_clock};
//! use recipebox_core::environment::Clock;
//!
//! let clock = test_clock();
//! let store = InMemoryStore::new();
//! let owner = store.insert_user(fixtures::user("chef", clock.now()));
//! let recipe = store.insert_recipe(fixtures::recipe(owner.id, "Soup", clock.now()));
//! assert!(store.recipe(recipe.id).is_some());
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use chrono::{DateTime, Utc};
use recipebox_core::environment::Clock;

mod gate;
mod notifiers;
mod store;

pub use gate::GatedAggregateStore;
pub use notifiers::{FailingNotifier, RecordingNotifier, SentCode};
pub use store::InMemoryStore;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use recipebox_testing::mocks::FixedClock;
    /// use recipebox_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use recipebox_testing::mocks::ManualClock;
    /// use recipebox_core::environment::Clock;
    ///
    /// let clock = ManualClock::starting_at(recipebox_testing::test_time());
    /// let before = clock.now();
    /// clock.advance(chrono::Duration::minutes(6));
    /// assert_eq!(clock.now() - before, chrono::Duration::minutes(6));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock reading `time`.
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward (or backward, for a negative delta).
        pub fn advance(&self, delta: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += delta;
        }

        /// Jump to an absolute time.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap() = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(super::test_time())
    }
}

/// The instant every default test clock reads: 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn test_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
}

/// Install a `tracing` subscriber that writes to the test output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,recipebox=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Builders for domain entities with sensible defaults.
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use recipebox_core::model::{
        Category, CategoryId, Collection, CollectionId, EntityStatus, Rating, RatingAggregate,
        RatingId, Recipe, RecipeId, User, UserId,
    };

    /// An active, unverified user.
    #[must_use]
    pub fn user(username: &str, created_at: DateTime<Utc>) -> User {
        User {
            id: UserId::new(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: format!("{username} Cook"),
            email_verified: false,
            verification_code: None,
            verification_expires_at: None,
            created_at,
            status: EntityStatus::Active,
        }
    }

    /// An active recipe with an empty aggregate.
    #[must_use]
    pub fn recipe(owner: UserId, title: &str, created_at: DateTime<Utc>) -> Recipe {
        Recipe {
            id: RecipeId::new(),
            user_id: owner,
            title: title.to_string(),
            category_id: None,
            aggregate: RatingAggregate::default(),
            created_at,
            updated_at: created_at,
            status: EntityStatus::Active,
        }
    }

    /// An active rating.
    #[must_use]
    pub fn rating(
        recipe_id: RecipeId,
        user_id: UserId,
        score: u8,
        created_at: DateTime<Utc>,
    ) -> Rating {
        Rating {
            id: RatingId::new(),
            recipe_id,
            user_id,
            score,
            comment: String::new(),
            created_at,
            updated_at: created_at,
            status: EntityStatus::Active,
        }
    }

    /// An active collection.
    #[must_use]
    pub fn collection(owner: UserId, name: &str) -> Collection {
        Collection {
            id: CollectionId::new(),
            user_id: owner,
            name: name.to_string(),
            status: EntityStatus::Active,
        }
    }

    /// An active category.
    #[must_use]
    pub fn category(name: &str) -> Category {
        Category {
            id: CategoryId::new(),
            name: name.to_string(),
            status: EntityStatus::Active,
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use recipebox_core::model::{MAX_SCORE, MIN_SCORE};

    /// Valid rating scores.
    pub fn score() -> impl Strategy<Value = u8> {
        MIN_SCORE..=MAX_SCORE
    }

    /// Millisecond offsets used to spread row timestamps; duplicates are
    /// likely, which exercises tie handling.
    pub fn millis_offsets(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(0i64..200, 0..max_len)
    }

    /// Requested page sizes, including out-of-range ones.
    pub fn requested_limit() -> impl Strategy<Value = i64> {
        prop_oneof![Just(0i64), Just(-1i64), 1i64..=60]
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
