//! Collection membership and the collection recipe listing.

use crate::config::CursorConfig;
use recipebox_core::cursor::CursorCodec;
use recipebox_core::environment::Clock;
use recipebox_core::model::{
    Collection, CollectionEntry, CollectionId, Recipe, RecipeId, UserId, to_millis_precision,
};
use recipebox_core::pagination::{Page, PageLimits};
use recipebox_core::store::{CollectionStore, EntryKey, RecipeStore};
use recipebox_core::{CoreError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Collection operations.
pub struct CollectionService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    codec: CursorCodec,
    limits: PageLimits,
}

impl<S> CollectionService<S>
where
    S: CollectionStore + RecipeStore,
{
    /// Create a service with default cursor settings.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, CursorConfig::default())
    }

    /// Create a service with explicit cursor settings.
    #[must_use]
    pub fn with_config(store: Arc<S>, clock: Arc<dyn Clock>, config: CursorConfig) -> Self {
        Self {
            store,
            codec: CursorCodec::new(Arc::clone(&clock)).with_future_grace(config.future_grace),
            clock,
            limits: config.limits,
        }
    }

    /// Add a recipe to the owner's collection.
    ///
    /// Adding a recipe that is already a member succeeds without moving it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the collection or recipe does not exist
    /// - `Forbidden` if `user_id` does not own the collection
    /// - `Unavailable` if the store fails
    pub async fn add_recipe(
        &self,
        collection_id: CollectionId,
        recipe_id: RecipeId,
        user_id: UserId,
    ) -> Result<()> {
        self.owned_collection(collection_id, user_id).await?;
        match self.store.get_recipe(recipe_id).await? {
            Some(recipe) if recipe.status.is_active() => {}
            _ => return Err(CoreError::not_found("recipe", recipe_id)),
        }

        let entry = CollectionEntry {
            collection_id,
            recipe_id,
            added_at: to_millis_precision(self.clock.now()),
        };
        let added = self.store.add_entry(&entry).await?;
        tracing::debug!(collection_id = %collection_id, recipe_id = %recipe_id, added, "Add recipe to collection");
        Ok(())
    }

    /// Remove a recipe from the owner's collection.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the collection does not exist or the recipe is not a member
    /// - `Forbidden` if `user_id` does not own the collection
    /// - `Unavailable` if the store fails
    pub async fn remove_recipe(
        &self,
        collection_id: CollectionId,
        recipe_id: RecipeId,
        user_id: UserId,
    ) -> Result<()> {
        self.owned_collection(collection_id, user_id).await?;
        if !self.store.remove_entry(collection_id, recipe_id).await? {
            return Err(CoreError::not_found(
                "collection entry",
                format!("{recipe_id} in {collection_id}"),
            ));
        }
        tracing::debug!(collection_id = %collection_id, recipe_id = %recipe_id, "Removed recipe from collection");
        Ok(())
    }

    /// Recipes of a collection, most recently added first.
    ///
    /// The cursor carries the time the last recipe of the previous page was
    /// added and that recipe's id, so members added in the same millisecond
    /// are neither skipped nor repeated. Members whose recipe is deleted are
    /// left out of the page, so a page may hold fewer items than `limit` and
    /// still have a next cursor.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the collection does not exist
    /// - `InvalidCursor` if the cursor is malformed
    /// - `Unavailable` if the store fails
    pub async fn list_collection_recipes(
        &self,
        collection_id: CollectionId,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Page<Recipe>> {
        self.require_collection(collection_id).await?;
        let limit = self.limits.clamp(limit);
        let after = self
            .codec
            .decode_keyset(cursor)?
            .map(|(added_at, id)| EntryKey {
                added_at,
                recipe_id: RecipeId::from_uuid(id),
            });

        let entries = self
            .store
            .list_entries(collection_id, after, PageLimits::fetch_size(limit))
            .await?;
        let page = Page::from_overfetch(entries, limit, |last| {
            self.codec.encode_keyset(last.added_at, last.recipe_id.as_uuid())
        });

        let ids: Vec<RecipeId> = page.items.iter().map(|e| e.recipe_id).collect();
        let mut recipes: HashMap<RecipeId, Recipe> = self
            .store
            .get_active_recipes(&ids)
            .await?
            .into_iter()
            .map(|recipe| (recipe.id, recipe))
            .collect();

        Ok(page.map_items(|entries| {
            entries
                .into_iter()
                .filter_map(|entry| recipes.remove(&entry.recipe_id))
                .collect()
        }))
    }

    async fn require_collection(&self, collection_id: CollectionId) -> Result<Collection> {
        self.store
            .get_collection(collection_id)
            .await?
            .ok_or_else(|| CoreError::not_found("collection", collection_id))
    }

    async fn owned_collection(&self, collection_id: CollectionId, user_id: UserId) -> Result<Collection> {
        let collection = self.require_collection(collection_id).await?;
        if collection.user_id != user_id {
            return Err(CoreError::Forbidden(format!(
                "user {user_id} does not own collection {collection_id}"
            )));
        }
        Ok(collection)
    }
}
