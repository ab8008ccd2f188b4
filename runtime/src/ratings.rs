//! Rating writes and rating listings.
//!
//! Every write ends with a synchronous aggregate recompute. If the write
//! succeeded but the recompute failed, the write is still reported as a
//! success and the failure travels back as
//! [`RatingMutation::aggregate_warning`]; the reconciliation sweep repairs
//! the aggregate later.

use crate::aggregate::RatingAggregateMaintainer;
use crate::config::CursorConfig;
use recipebox_core::cursor::CursorCodec;
use recipebox_core::environment::Clock;
use recipebox_core::model::{
    EntityStatus, MAX_SCORE, MIN_SCORE, Rating, RatingAggregate, RatingId, RatingWithAuthor,
    Recipe, RecipeId, UserId, UserSummary, to_millis_precision,
};
use recipebox_core::pagination::{Page, PageLimits};
use recipebox_core::store::{RatingAggregateStore, RatingKey, RatingStore, RecipeStore, UserStore};
use recipebox_core::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Input of [`RatingService::rate_recipe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRating {
    /// Recipe being rated
    pub recipe_id: RecipeId,
    /// User rating it
    pub user_id: UserId,
    /// Score in `[1, 5]`
    pub score: u8,
    /// Free-text comment
    pub comment: String,
}

/// Input of [`RatingService::update_rating`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingUpdate {
    /// New score; `None` keeps the current one
    pub score: Option<u8>,
    /// Replacement comment
    pub comment: String,
}

/// Result of a rating write.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingMutation {
    /// The rating as stored
    pub rating: Rating,
    /// Aggregate written by the follow-up recompute
    pub aggregate: Option<RatingAggregate>,
    /// Recompute failure; the write itself succeeded
    pub aggregate_warning: Option<CoreError>,
}

/// Rating operations.
pub struct RatingService<S> {
    store: Arc<S>,
    maintainer: Arc<RatingAggregateMaintainer<S>>,
    clock: Arc<dyn Clock>,
    codec: CursorCodec,
    limits: PageLimits,
}

impl<S> RatingService<S>
where
    S: RatingStore + RecipeStore + UserStore + RatingAggregateStore,
{
    /// Create a service with default cursor settings.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        maintainer: Arc<RatingAggregateMaintainer<S>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = CursorConfig::default();
        Self {
            store,
            maintainer,
            codec: CursorCodec::new(Arc::clone(&clock)).with_future_grace(config.future_grace),
            clock,
            limits: config.limits,
        }
    }

    /// Replace the cursor settings.
    #[must_use]
    pub fn with_cursor_config(mut self, config: CursorConfig) -> Self {
        self.codec = CursorCodec::new(Arc::clone(&self.clock)).with_future_grace(config.future_grace);
        self.limits = config.limits;
        self
    }

    /// Rate a recipe, replacing the caller's existing active rating if any.
    ///
    /// # Errors
    ///
    /// - `Validation` if the score is outside `[1, 5]`
    /// - `NotFound` if the recipe does not exist or is deleted
    /// - `Conflict` if a concurrent call inserted the user's rating first
    /// - `Unavailable` if the store fails
    pub async fn rate_recipe(&self, input: NewRating) -> Result<RatingMutation> {
        validate_score(input.score)?;
        self.require_recipe(input.recipe_id).await?;

        let now = to_millis_precision(self.clock.now());
        let existing = self
            .store
            .find_active_rating(input.user_id, input.recipe_id)
            .await?;

        let rating = if let Some(mut rating) = existing {
            rating.score = input.score;
            rating.comment = input.comment;
            rating.updated_at = now;
            self.store.update_rating(&rating).await?;
            tracing::debug!(rating_id = %rating.id, recipe_id = %rating.recipe_id, "Replaced existing rating");
            rating
        } else {
            let rating = Rating {
                id: RatingId::new(),
                recipe_id: input.recipe_id,
                user_id: input.user_id,
                score: input.score,
                comment: input.comment,
                created_at: now,
                updated_at: now,
                status: EntityStatus::Active,
            };
            self.store.insert_rating(&rating).await?;
            tracing::debug!(rating_id = %rating.id, recipe_id = %rating.recipe_id, "Created rating");
            rating
        };

        Ok(self.finish(rating).await)
    }

    /// Change the score and comment of the caller's rating.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the rating does not exist or is deleted
    /// - `Forbidden` if `user_id` does not own the rating
    /// - `Validation` if a new score is outside `[1, 5]`
    /// - `Unavailable` if the store fails
    pub async fn update_rating(
        &self,
        rating_id: RatingId,
        user_id: UserId,
        update: RatingUpdate,
    ) -> Result<RatingMutation> {
        let mut rating = self.owned_rating(rating_id, user_id, "update").await?;
        if let Some(score) = update.score {
            validate_score(score)?;
            rating.score = score;
        }
        rating.comment = update.comment;
        rating.updated_at = to_millis_precision(self.clock.now());

        self.store.update_rating(&rating).await?;
        tracing::debug!(rating_id = %rating.id, "Updated rating");
        Ok(self.finish(rating).await)
    }

    /// Soft-delete the caller's rating.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the rating does not exist or is already deleted
    /// - `Forbidden` if `user_id` does not own the rating
    /// - `Unavailable` if the store fails
    pub async fn delete_rating(&self, rating_id: RatingId, user_id: UserId) -> Result<RatingMutation> {
        let mut rating = self.owned_rating(rating_id, user_id, "delete").await?;
        rating.status = EntityStatus::Deleted;
        rating.updated_at = to_millis_precision(self.clock.now());

        self.store.update_rating(&rating).await?;
        tracing::debug!(rating_id = %rating.id, "Deleted rating");
        Ok(self.finish(rating).await)
    }

    /// Fetch an active rating.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the rating does not exist or is deleted.
    pub async fn get_rating(&self, rating_id: RatingId) -> Result<Rating> {
        match self.store.get_rating(rating_id).await? {
            Some(rating) if rating.status.is_active() => Ok(rating),
            _ => Err(CoreError::not_found("rating", rating_id)),
        }
    }

    /// Fetch the user's active rating of a recipe.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has not rated the recipe.
    pub async fn get_user_rating(&self, user_id: UserId, recipe_id: RecipeId) -> Result<Rating> {
        self.store
            .find_active_rating(user_id, recipe_id)
            .await?
            .ok_or_else(|| CoreError::not_found("rating", format!("user {user_id} on recipe {recipe_id}")))
    }

    /// Active ratings of a recipe, newest first.
    ///
    /// The cursor is the identifier of the last rating of the previous page.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the recipe does not exist or is deleted
    /// - `InvalidCursor` if the cursor is malformed, unknown, or belongs to
    ///   another recipe
    /// - `Unavailable` if the store fails
    pub async fn list_ratings(
        &self,
        recipe_id: RecipeId,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Page<Rating>> {
        self.require_recipe(recipe_id).await?;
        let limit = self.limits.clamp(limit);
        let after = self.resolve_cursor(recipe_id, cursor).await?;

        let rows = self
            .store
            .list_ratings(recipe_id, after, PageLimits::fetch_size(limit))
            .await?;
        Ok(Page::from_overfetch(rows, limit, |last| {
            self.codec.encode_id(last.id.as_uuid())
        }))
    }

    /// Same as [`list_ratings`](Self::list_ratings), with each rating's author.
    ///
    /// Authors that no longer exist are represented by a summary carrying
    /// only their identifier.
    ///
    /// # Errors
    ///
    /// Same as [`list_ratings`](Self::list_ratings).
    pub async fn list_ratings_with_authors(
        &self,
        recipe_id: RecipeId,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Page<RatingWithAuthor>> {
        let page = self.list_ratings(recipe_id, cursor, limit).await?;

        let mut author_ids: Vec<UserId> = page.items.iter().map(|r| r.user_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors: HashMap<UserId, UserSummary> = self
            .store
            .get_user_summaries(&author_ids)
            .await?
            .into_iter()
            .map(|summary| (summary.id, summary))
            .collect();

        Ok(page.map_items(|ratings| {
            ratings
                .into_iter()
                .map(|rating| {
                    let author = authors
                        .get(&rating.user_id)
                        .cloned()
                        .unwrap_or_else(|| UserSummary::placeholder(rating.user_id));
                    RatingWithAuthor { rating, author }
                })
                .collect()
        }))
    }

    /// Recompute a recipe's aggregate on demand.
    ///
    /// # Errors
    ///
    /// Returns the store error from the recompute.
    pub async fn repair_aggregate(&self, recipe_id: RecipeId) -> Result<RatingAggregate> {
        tracing::info!(recipe_id = %recipe_id, "Manual rating aggregate repair");
        self.maintainer.recompute(recipe_id).await
    }

    async fn require_recipe(&self, recipe_id: RecipeId) -> Result<Recipe> {
        match self.store.get_recipe(recipe_id).await? {
            Some(recipe) if recipe.status.is_active() => Ok(recipe),
            _ => Err(CoreError::not_found("recipe", recipe_id)),
        }
    }

    async fn owned_rating(&self, rating_id: RatingId, user_id: UserId, action: &str) -> Result<Rating> {
        let rating = self.get_rating(rating_id).await?;
        if rating.user_id != user_id {
            return Err(CoreError::Forbidden(format!(
                "user {user_id} may not {action} rating {rating_id}"
            )));
        }
        Ok(rating)
    }

    async fn resolve_cursor(
        &self,
        recipe_id: RecipeId,
        cursor: Option<&str>,
    ) -> Result<Option<RatingKey>> {
        let Some(id) = self.codec.decode_id(cursor)? else {
            return Ok(None);
        };
        let rating_id = RatingId::from_uuid(id);
        match self.store.get_rating(rating_id).await? {
            Some(rating) if rating.recipe_id == recipe_id => Ok(Some(RatingKey::from(&rating))),
            Some(_) => Err(CoreError::InvalidCursor(format!(
                "rating {rating_id} does not belong to recipe {recipe_id}"
            ))),
            None => Err(CoreError::InvalidCursor(format!(
                "rating {rating_id} does not exist"
            ))),
        }
    }

    async fn finish(&self, rating: Rating) -> RatingMutation {
        match self.maintainer.recompute(rating.recipe_id).await {
            Ok(aggregate) => RatingMutation {
                rating,
                aggregate: Some(aggregate),
                aggregate_warning: None,
            },
            Err(error) => {
                tracing::warn!(
                    recipe_id = %rating.recipe_id,
                    rating_id = %rating.id,
                    error = %error,
                    "Rating saved but aggregate recompute failed"
                );
                RatingMutation {
                    rating,
                    aggregate: None,
                    aggregate_warning: Some(error),
                }
            }
        }
    }
}

fn validate_score(score: u8) -> Result<()> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
        )))
    }
}
