//! Domain model for ratings, recipes and the entities the listings touch.

use crate::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Recipe identifier.
    RecipeId
);
define_id!(
    /// Rating identifier.
    RatingId
);
define_id!(
    /// User identifier.
    UserId
);
define_id!(
    /// Collection identifier.
    CollectionId
);
define_id!(
    /// Category identifier.
    CategoryId
);

/// Soft-delete status carried by every persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityStatus {
    /// Visible to reads and counted by aggregates.
    Active,
    /// Soft-deleted; kept for cursor resolution only.
    Deleted,
}

impl EntityStatus {
    /// Database representation (`1` active, `0` deleted).
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Active => 1,
            Self::Deleted => 0,
        }
    }

    /// Parse the database representation; anything but `1` is deleted.
    #[must_use]
    pub const fn from_i16(value: i16) -> Self {
        if value == 1 { Self::Active } else { Self::Deleted }
    }

    /// Whether the entity is active.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Lowest accepted rating score.
pub const MIN_SCORE: u8 = 1;
/// Highest accepted rating score.
pub const MAX_SCORE: u8 = 5;

/// A user's rating of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Rating identifier
    pub id: RatingId,
    /// Rated recipe
    pub recipe_id: RecipeId,
    /// Author of the rating
    pub user_id: UserId,
    /// Score in `[MIN_SCORE, MAX_SCORE]`
    pub score: u8,
    /// Free-text comment (may be empty)
    pub comment: String,
    /// Creation time (millisecond precision)
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Soft-delete status
    pub status: EntityStatus,
}

/// A rating together with a summary of its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingWithAuthor {
    /// The rating
    pub rating: Rating,
    /// Author summary; only `id` is set when the author no longer exists
    pub author: UserSummary,
}

/// Raw count and score total of a recipe's active ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Number of active ratings
    pub count: u64,
    /// Sum of their scores
    pub total: u64,
}

/// Denormalized rating fields stored on a recipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    /// Number of active ratings
    pub rating_count: u64,
    /// Arithmetic mean of active scores, `0.0` when there are none
    pub avg_rating: f64,
}

impl RatingAggregate {
    /// Derive the aggregate fields from a summary.
    ///
    /// # Examples
    ///
    /// ```
    /// use recipebox_core::model::{RatingAggregate, RatingSummary};
    ///
    /// let agg = RatingAggregate::from_summary(RatingSummary { count: 3, total: 12 });
    /// assert_eq!(agg.rating_count, 3);
    /// assert!((agg.avg_rating - 4.0).abs() < f64::EPSILON);
    ///
    /// let empty = RatingAggregate::from_summary(RatingSummary::default());
    /// assert_eq!(empty.avg_rating, 0.0);
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // counts and totals stay far below 2^52
    pub fn from_summary(summary: RatingSummary) -> Self {
        if summary.count == 0 {
            return Self {
                rating_count: 0,
                avg_rating: 0.0,
            };
        }
        Self {
            rating_count: summary.count,
            avg_rating: summary.total as f64 / summary.count as f64,
        }
    }
}

/// A recipe as seen by the core: identity, ownership and aggregate fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Recipe identifier
    pub id: RecipeId,
    /// Author of the recipe
    pub user_id: UserId,
    /// Title
    pub title: String,
    /// Category the recipe is filed under
    pub category_id: Option<CategoryId>,
    /// Denormalized rating fields
    pub aggregate: RatingAggregate,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Soft-delete status
    pub status: EntityStatus,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: UserId,
    /// Unique handle
    pub username: String,
    /// Email address, destination of one-time codes
    pub email: String,
    /// Display name
    pub full_name: String,
    /// Whether the email address was verified
    pub email_verified: bool,
    /// Outstanding one-time code
    pub verification_code: Option<String>,
    /// Expiry of the outstanding code
    pub verification_expires_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Soft-delete status
    pub status: EntityStatus,
}

impl User {
    /// Public summary of this user.
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
        }
    }
}

/// Public summary of a user used by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User identifier
    pub id: UserId,
    /// Unique handle
    pub username: String,
    /// Display name
    pub full_name: String,
}

impl UserSummary {
    /// Summary carrying only the identifier, for authors that no longer exist.
    #[must_use]
    pub const fn placeholder(id: UserId) -> Self {
        Self {
            id,
            username: String::new(),
            full_name: String::new(),
        }
    }
}

/// A named collection of recipes owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection identifier
    pub id: CollectionId,
    /// Owner
    pub user_id: UserId,
    /// Name
    pub name: String,
    /// Soft-delete status
    pub status: EntityStatus,
}

/// Membership of a recipe in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEntry {
    /// Collection
    pub collection_id: CollectionId,
    /// Member recipe
    pub recipe_id: RecipeId,
    /// When the recipe was added (millisecond precision)
    pub added_at: DateTime<Utc>,
}

/// A follow relationship between two users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    /// The user doing the following
    pub follower_id: UserId,
    /// The user being followed
    pub following_id: UserId,
    /// When the follow started (millisecond precision)
    pub created_at: DateTime<Utc>,
}

/// A recipe category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category identifier
    pub id: CategoryId,
    /// Display name, primary sort key of the category listing
    pub name: String,
    /// Soft-delete status
    pub status: EntityStatus,
}

/// Truncate a timestamp to millisecond precision.
///
/// Writers store millisecond timestamps so that timestamp cursors compare
/// exactly against stored values.
#[must_use]
pub fn to_millis_precision(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_of_five_three_four_is_four() {
        let agg = RatingAggregate::from_summary(RatingSummary { count: 3, total: 12 });
        assert_eq!(agg.rating_count, 3);
        assert!((agg.avg_rating - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn aggregate_keeps_fractional_mean() {
        let agg = RatingAggregate::from_summary(RatingSummary { count: 2, total: 9 });
        assert!((agg.avg_rating - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_gives_zero_average() {
        let agg = RatingAggregate::from_summary(RatingSummary::default());
        assert_eq!(agg.rating_count, 0);
        assert!(agg.avg_rating == 0.0 && !agg.avg_rating.is_nan());
    }

    #[test]
    fn status_round_trips_through_database_form() {
        assert_eq!(EntityStatus::from_i16(EntityStatus::Active.as_i16()), EntityStatus::Active);
        assert_eq!(EntityStatus::from_i16(0), EntityStatus::Deleted);
        assert_eq!(EntityStatus::from_i16(7), EntityStatus::Deleted);
    }

    #[test]
    fn millis_precision_drops_sub_millisecond_part() {
        let t = DateTime::<Utc>::from_timestamp(1_700_000_000, 123_456_789).unwrap_or_default();
        let truncated = to_millis_precision(t);
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_000_000);
    }
}
