//! Persistence traits the runtime is written against.
//!
//! Every keyset listing method takes the position to continue from and a
//! `fetch` count. Implementations return at most `fetch` rows strictly past
//! the position, in the order documented on the method, and only active
//! rows. Callers pass `limit + 1` to learn whether another page exists.
//!
//! Backend failures are reported as [`CoreError::Unavailable`](crate::CoreError::Unavailable).

use crate::error::Result;
use crate::model::{
    Category, CategoryId, Collection, CollectionEntry, CollectionId, Follow, Rating,
    RatingAggregate, RatingId, RatingSummary, Recipe, RecipeId, User, UserId, UserSummary,
};
use crate::{DateTime, Utc};
use std::future::Future;

/// Position of a rating in the `created_at DESC, id DESC` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingKey {
    /// Creation time of the last-seen rating
    pub created_at: DateTime<Utc>,
    /// Identifier of the last-seen rating
    pub id: RatingId,
}

impl From<&Rating> for RatingKey {
    fn from(rating: &Rating) -> Self {
        Self {
            created_at: rating.created_at,
            id: rating.id,
        }
    }
}

/// Position of a collection member in the `added_at DESC, recipe_id DESC` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryKey {
    /// Time the last-seen recipe was added
    pub added_at: DateTime<Utc>,
    /// Last-seen recipe
    pub recipe_id: RecipeId,
}

impl From<&CollectionEntry> for EntryKey {
    fn from(entry: &CollectionEntry) -> Self {
        Self {
            added_at: entry.added_at,
            recipe_id: entry.recipe_id,
        }
    }
}

/// Position in a follow listing, ordered by `created_at DESC` and then by the
/// listed user's id, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowKey {
    /// Creation time of the last-seen follow
    pub created_at: DateTime<Utc>,
    /// The listed user of the last-seen follow (follower or followee)
    pub user_id: UserId,
}

/// Position of a category in the `name ASC, id ASC` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryKey {
    /// Name of the last-seen category
    pub name: String,
    /// Identifier of the last-seen category
    pub id: CategoryId,
}

impl From<&Category> for CategoryKey {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            id: category.id,
        }
    }
}

/// Storage of the denormalized rating aggregate.
pub trait RatingAggregateStore: Send + Sync {
    /// Identifiers of every active recipe.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn list_active_recipe_ids(&self) -> impl Future<Output = Result<Vec<RecipeId>>> + Send;

    /// Count and score total of the recipe's active ratings.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn summarize_active_ratings(
        &self,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<RatingSummary>> + Send;

    /// Persist both aggregate fields of a recipe together.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the recipe does not exist, `Unavailable` if the
    /// backend fails.
    fn update_rating_aggregate(
        &self,
        recipe_id: RecipeId,
        aggregate: RatingAggregate,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Recipe lookups.
pub trait RecipeStore: Send + Sync {
    /// Fetch a recipe in any status.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn get_recipe(&self, id: RecipeId) -> impl Future<Output = Result<Option<Recipe>>> + Send;

    /// Fetch the active recipes among `ids`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn get_active_recipes(
        &self,
        ids: &[RecipeId],
    ) -> impl Future<Output = Result<Vec<Recipe>>> + Send;
}

/// Rating persistence.
pub trait RatingStore: Send + Sync {
    /// Fetch a rating in any status.
    ///
    /// Soft-deleted ratings stay resolvable so cursors pointing at them keep
    /// working.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn get_rating(&self, id: RatingId) -> impl Future<Output = Result<Option<Rating>>> + Send;

    /// The user's active rating of a recipe, if any.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn find_active_rating(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<Option<Rating>>> + Send;

    /// Insert a new rating.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the user already has an active rating of the
    /// recipe, `Unavailable` if the backend fails.
    fn insert_rating(&self, rating: &Rating) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite score, comment, status and `updated_at` of a rating.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the rating does not exist, `Unavailable` if the
    /// backend fails.
    fn update_rating(&self, rating: &Rating) -> impl Future<Output = Result<()>> + Send;

    /// Active ratings of a recipe ordered by `created_at DESC, id DESC`,
    /// strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn list_ratings(
        &self,
        recipe_id: RecipeId,
        after: Option<RatingKey>,
        fetch: usize,
    ) -> impl Future<Output = Result<Vec<Rating>>> + Send;
}

/// User persistence.
pub trait UserStore: Send + Sync {
    /// Fetch an active user.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn get_user(&self, id: UserId) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Summaries of the active users among `ids`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn get_user_summaries(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<UserSummary>>> + Send;

    /// Persist the verification fields of a user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist, `Unavailable` if the
    /// backend fails.
    fn update_verification(&self, user: &User) -> impl Future<Output = Result<()>> + Send;
}

/// Collection membership persistence.
pub trait CollectionStore: Send + Sync {
    /// Fetch an active collection.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn get_collection(
        &self,
        id: CollectionId,
    ) -> impl Future<Output = Result<Option<Collection>>> + Send;

    /// Membership rows ordered by `added_at DESC, recipe_id DESC`, strictly
    /// after `after`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn list_entries(
        &self,
        collection_id: CollectionId,
        after: Option<EntryKey>,
        fetch: usize,
    ) -> impl Future<Output = Result<Vec<CollectionEntry>>> + Send;

    /// Add a membership row; returns `false` if the recipe was already a member.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn add_entry(&self, entry: &CollectionEntry) -> impl Future<Output = Result<bool>> + Send;

    /// Remove a membership row; returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn remove_entry(
        &self,
        collection_id: CollectionId,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Follow relationship persistence.
pub trait FollowStore: Send + Sync {
    /// Follows whose `following_id` is `user_id`, ordered by
    /// `created_at DESC, follower_id DESC`, strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn list_followers(
        &self,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> impl Future<Output = Result<Vec<Follow>>> + Send;

    /// Follows whose `follower_id` is `user_id`, ordered by
    /// `created_at DESC, following_id DESC`, strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn list_following(
        &self,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> impl Future<Output = Result<Vec<Follow>>> + Send;

    /// Record a follow.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the relationship already exists, `Unavailable`
    /// if the backend fails.
    fn insert_follow(&self, follow: &Follow) -> impl Future<Output = Result<()>> + Send;

    /// Remove a follow; returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn delete_follow(
        &self,
        follower_id: UserId,
        following_id: UserId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Number of users following `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn count_followers(&self, user_id: UserId) -> impl Future<Output = Result<u64>> + Send;

    /// Number of users `user_id` follows.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn count_following(&self, user_id: UserId) -> impl Future<Output = Result<u64>> + Send;
}

/// Category lookups.
pub trait CategoryStore: Send + Sync {
    /// Fetch a category in any status.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn get_category(
        &self,
        id: CategoryId,
    ) -> impl Future<Output = Result<Option<Category>>> + Send;

    /// Active categories ordered by `name ASC, id ASC`, strictly after `after`.
    ///
    /// Names compare byte-wise.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend fails.
    fn list_categories(
        &self,
        after: Option<CategoryKey>,
        fetch: usize,
    ) -> impl Future<Output = Result<Vec<Category>>> + Send;
}
