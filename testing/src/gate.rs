//! Aggregate store wrapper that parks the first recompute.

use recipebox_core::Result;
use recipebox_core::model::{RatingAggregate, RatingSummary, RecipeId};
use recipebox_core::store::RatingAggregateStore;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Wraps a [`RatingAggregateStore`] and blocks the first
/// `summarize_active_ratings` call until [`release`](Self::release) is called.
///
/// Lets lifecycle tests act while a recompute is provably in flight:
///
/// ```ignore
/// let store = Arc::new(GatedAggregateStore::new(InMemoryStore::new()));
/// // ... start a sweep over `store` ...
/// store.wait_until_entered().await;
/// // a recompute is now parked inside the store
/// store.release();
/// ```
#[derive(Debug)]
pub struct GatedAggregateStore<S> {
    inner: S,
    armed: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl<S> GatedAggregateStore<S> {
    /// Wrap `inner` with an armed gate.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    /// Wait until a summarize call is parked at the gate.
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    /// Let the parked call continue. Later calls pass straight through.
    pub fn release(&self) {
        self.released.notify_one();
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> RatingAggregateStore for GatedAggregateStore<S>
where
    S: RatingAggregateStore,
{
    async fn list_active_recipe_ids(&self) -> Result<Vec<RecipeId>> {
        self.inner.list_active_recipe_ids().await
    }

    async fn summarize_active_ratings(&self, recipe_id: RecipeId) -> Result<RatingSummary> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.inner.summarize_active_ratings(recipe_id).await
    }

    async fn update_rating_aggregate(
        &self,
        recipe_id: RecipeId,
        aggregate: RatingAggregate,
    ) -> Result<()> {
        self.inner.update_rating_aggregate(recipe_id, aggregate).await
    }
}
