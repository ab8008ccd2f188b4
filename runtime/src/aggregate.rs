//! Rating aggregate recomputation shared by the write path and the sweep.

use crate::metrics::AggregateMetrics;
use recipebox_core::model::{RatingAggregate, RecipeId};
use recipebox_core::store::RatingAggregateStore;
use recipebox_core::Result;
use std::sync::Arc;

/// Recomputes the denormalized rating fields of a recipe.
///
/// A recompute reads the count and score total of the recipe's active
/// ratings and writes both aggregate fields in one store call. Running it
/// twice with no intervening writes stores the same values, so it is safe to
/// call from the write path, the reconciliation sweep and manual repair at the
/// same time.
pub struct RatingAggregateMaintainer<S> {
    store: Arc<S>,
}

impl<S> RatingAggregateMaintainer<S>
where
    S: RatingAggregateStore,
{
    /// Create a maintainer over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Recompute and persist the aggregate of one recipe.
    ///
    /// # Errors
    ///
    /// Returns the store error if reading the summary or writing the
    /// aggregate fails. A recipe that does not exist yields `NotFound` from
    /// the write.
    pub async fn recompute(&self, recipe_id: RecipeId) -> Result<RatingAggregate> {
        let result = self.recompute_inner(recipe_id).await;
        match &result {
            Ok(aggregate) => {
                AggregateMetrics::record_recompute();
                tracing::debug!(
                    recipe_id = %recipe_id,
                    rating_count = aggregate.rating_count,
                    avg_rating = aggregate.avg_rating,
                    "Rating aggregate recomputed"
                );
            }
            Err(error) => {
                AggregateMetrics::record_failure();
                tracing::debug!(recipe_id = %recipe_id, error = %error, "Rating aggregate recompute failed");
            }
        }
        result
    }

    async fn recompute_inner(&self, recipe_id: RecipeId) -> Result<RatingAggregate> {
        let summary = self.store.summarize_active_ratings(recipe_id).await?;
        let aggregate = RatingAggregate::from_summary(summary);
        self.store
            .update_rating_aggregate(recipe_id, aggregate)
            .await?;
        Ok(aggregate)
    }

    /// Store the maintainer writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S> std::fmt::Debug for RatingAggregateMaintainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingAggregateMaintainer").finish_non_exhaustive()
    }
}
