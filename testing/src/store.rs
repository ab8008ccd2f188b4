//! In-memory implementation of every store trait.

use recipebox_core::model::{
    Category, CategoryId, Collection, CollectionEntry, CollectionId, Follow, Rating,
    RatingAggregate, RatingId, RatingSummary, Recipe, RecipeId, User, UserId, UserSummary,
};
use recipebox_core::store::{
    CategoryKey, CategoryStore, CollectionStore, EntryKey, FollowKey, FollowStore,
    RatingAggregateStore, RatingKey, RatingStore, RecipeStore, UserStore,
};
use recipebox_core::{CoreError, Result};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct State {
    recipes: HashMap<RecipeId, Recipe>,
    ratings: HashMap<RatingId, Rating>,
    users: HashMap<UserId, User>,
    collections: HashMap<CollectionId, Collection>,
    entries: Vec<CollectionEntry>,
    follows: Vec<Follow>,
    categories: HashMap<CategoryId, Category>,
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    failing_summaries: HashSet<RecipeId>,
    failing_aggregate_writes: bool,
}

/// In-memory store for fast, deterministic tests.
///
/// Clones share the same data. Listing methods honour the ordering and
/// keyset contracts of the store traits so services behave as they would
/// against Postgres.
///
/// # Failure injection
///
/// - [`set_unavailable`](Self::set_unavailable): every call fails
/// - [`fail_summaries_for`](Self::fail_summaries_for): summarizing one recipe fails
/// - [`set_aggregate_writes_failing`](Self::set_aggregate_writes_failing):
///   aggregate writes fail while everything else works
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    faults: Arc<RwLock<Faults>>,
    summaries: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ----- seeding -----

    /// Insert or replace a user.
    pub fn insert_user(&self, user: User) -> User {
        self.state.write().unwrap().users.insert(user.id, user.clone());
        user
    }

    /// Insert or replace a recipe.
    pub fn insert_recipe(&self, recipe: Recipe) -> Recipe {
        self.state
            .write()
            .unwrap()
            .recipes
            .insert(recipe.id, recipe.clone());
        recipe
    }

    /// Insert or replace a rating without any uniqueness check.
    pub fn seed_rating(&self, rating: Rating) -> Rating {
        self.state
            .write()
            .unwrap()
            .ratings
            .insert(rating.id, rating.clone());
        rating
    }

    /// Insert or replace a collection.
    pub fn insert_collection(&self, collection: Collection) -> Collection {
        self.state
            .write()
            .unwrap()
            .collections
            .insert(collection.id, collection.clone());
        collection
    }

    /// Append a membership row without any uniqueness check.
    pub fn seed_entry(&self, entry: CollectionEntry) {
        self.state.write().unwrap().entries.push(entry);
    }

    /// Append a follow without any uniqueness check.
    pub fn seed_follow(&self, follow: Follow) {
        self.state.write().unwrap().follows.push(follow);
    }

    /// Insert or replace a category.
    pub fn insert_category(&self, category: Category) -> Category {
        self.state
            .write()
            .unwrap()
            .categories
            .insert(category.id, category.clone());
        category
    }

    /// Remove a user entirely, as if deleted between two calls.
    pub fn remove_user(&self, id: UserId) {
        self.state.write().unwrap().users.remove(&id);
    }

    // ----- inspection -----

    /// Current state of a recipe.
    #[must_use]
    pub fn recipe(&self, id: RecipeId) -> Option<Recipe> {
        self.state.read().unwrap().recipes.get(&id).cloned()
    }

    /// Current state of a user in any status.
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<User> {
        self.state.read().unwrap().users.get(&id).cloned()
    }

    /// Current state of a rating in any status.
    #[must_use]
    pub fn rating(&self, id: RatingId) -> Option<Rating> {
        self.state.read().unwrap().ratings.get(&id).cloned()
    }

    /// Overwrite the stored aggregate of a recipe, e.g. to make it stale.
    pub fn set_aggregate(&self, id: RecipeId, aggregate: RatingAggregate) {
        if let Some(recipe) = self.state.write().unwrap().recipes.get_mut(&id) {
            recipe.aggregate = aggregate;
        }
    }

    /// Number of `summarize_active_ratings` calls so far.
    #[must_use]
    pub fn summarize_calls(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }

    // ----- failure injection -----

    /// Make every store call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.write().unwrap().unavailable = unavailable;
    }

    /// Make summarizing `recipe_id` fail with `Unavailable`.
    pub fn fail_summaries_for(&self, recipe_id: RecipeId) {
        self.faults
            .write()
            .unwrap()
            .failing_summaries
            .insert(recipe_id);
    }

    /// Make aggregate writes fail with `Unavailable`.
    pub fn set_aggregate_writes_failing(&self, failing: bool) {
        self.faults.write().unwrap().failing_aggregate_writes = failing;
    }

    fn check_available(&self) -> Result<()> {
        if self.faults.read().unwrap().unavailable {
            return Err(CoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

fn take<T>(mut rows: Vec<T>, fetch: usize) -> Vec<T> {
    rows.truncate(fetch);
    rows
}

impl RatingAggregateStore for InMemoryStore {
    async fn list_active_recipe_ids(&self) -> Result<Vec<RecipeId>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        let mut ids: Vec<RecipeId> = state
            .recipes
            .values()
            .filter(|r| r.status.is_active())
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn summarize_active_ratings(&self, recipe_id: RecipeId) -> Result<RatingSummary> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self
            .faults
            .read()
            .unwrap()
            .failing_summaries
            .contains(&recipe_id)
        {
            return Err(CoreError::Unavailable(format!(
                "summary of recipe {recipe_id} unavailable"
            )));
        }
        let state = self.state.read().unwrap();
        let summary = state
            .ratings
            .values()
            .filter(|r| r.recipe_id == recipe_id && r.status.is_active())
            .fold(RatingSummary::default(), |acc, r| RatingSummary {
                count: acc.count + 1,
                total: acc.total + u64::from(r.score),
            });
        Ok(summary)
    }

    async fn update_rating_aggregate(
        &self,
        recipe_id: RecipeId,
        aggregate: RatingAggregate,
    ) -> Result<()> {
        self.check_available()?;
        if self.faults.read().unwrap().failing_aggregate_writes {
            return Err(CoreError::Unavailable("aggregate write rejected".to_string()));
        }
        let mut state = self.state.write().unwrap();
        let recipe = state
            .recipes
            .get_mut(&recipe_id)
            .ok_or_else(|| CoreError::not_found("recipe", recipe_id))?;
        recipe.aggregate = aggregate;
        Ok(())
    }
}

impl RecipeStore for InMemoryStore {
    async fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>> {
        self.check_available()?;
        Ok(self.recipe(id))
    }

    async fn get_active_recipes(&self, ids: &[RecipeId]) -> Result<Vec<Recipe>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.recipes.get(id))
            .filter(|r| r.status.is_active())
            .cloned()
            .collect())
    }
}

impl RatingStore for InMemoryStore {
    async fn get_rating(&self, id: RatingId) -> Result<Option<Rating>> {
        self.check_available()?;
        Ok(self.rating(id))
    }

    async fn find_active_rating(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<Option<Rating>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        Ok(state
            .ratings
            .values()
            .find(|r| r.user_id == user_id && r.recipe_id == recipe_id && r.status.is_active())
            .cloned())
    }

    async fn insert_rating(&self, rating: &Rating) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().unwrap();
        let duplicate = state.ratings.contains_key(&rating.id)
            || state.ratings.values().any(|r| {
                r.user_id == rating.user_id && r.recipe_id == rating.recipe_id && r.status.is_active()
            });
        if duplicate {
            return Err(CoreError::Conflict(format!(
                "user {} already rated recipe {}",
                rating.user_id, rating.recipe_id
            )));
        }
        state.ratings.insert(rating.id, rating.clone());
        Ok(())
    }

    async fn update_rating(&self, rating: &Rating) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().unwrap();
        let stored = state
            .ratings
            .get_mut(&rating.id)
            .ok_or_else(|| CoreError::not_found("rating", rating.id))?;
        stored.score = rating.score;
        stored.comment.clone_from(&rating.comment);
        stored.status = rating.status;
        stored.updated_at = rating.updated_at;
        Ok(())
    }

    async fn list_ratings(
        &self,
        recipe_id: RecipeId,
        after: Option<RatingKey>,
        fetch: usize,
    ) -> Result<Vec<Rating>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        let mut rows: Vec<Rating> = state
            .ratings
            .values()
            .filter(|r| r.recipe_id == recipe_id && r.status.is_active())
            .filter(|r| after.is_none_or(|k| (r.created_at, r.id) < (k.created_at, k.id)))
            .cloned()
            .collect();
        rows.sort_by_key(|r| Reverse((r.created_at, r.id)));
        Ok(take(rows, fetch))
    }
}

impl UserStore for InMemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.check_available()?;
        Ok(self.user(id).filter(|u| u.status.is_active()))
    }

    async fn get_user_summaries(&self, ids: &[UserId]) -> Result<Vec<UserSummary>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .filter(|u| u.status.is_active())
            .map(User::summary)
            .collect())
    }

    async fn update_verification(&self, user: &User) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().unwrap();
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| CoreError::not_found("user", user.id))?;
        stored.email_verified = user.email_verified;
        stored.verification_code.clone_from(&user.verification_code);
        stored.verification_expires_at = user.verification_expires_at;
        Ok(())
    }
}

impl CollectionStore for InMemoryStore {
    async fn get_collection(&self, id: CollectionId) -> Result<Option<Collection>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        Ok(state
            .collections
            .get(&id)
            .filter(|c| c.status.is_active())
            .cloned())
    }

    async fn list_entries(
        &self,
        collection_id: CollectionId,
        after: Option<EntryKey>,
        fetch: usize,
    ) -> Result<Vec<CollectionEntry>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        let mut rows: Vec<CollectionEntry> = state
            .entries
            .iter()
            .filter(|e| e.collection_id == collection_id)
            .filter(|e| after.is_none_or(|k| (e.added_at, e.recipe_id) < (k.added_at, k.recipe_id)))
            .copied()
            .collect();
        rows.sort_by_key(|e| Reverse((e.added_at, e.recipe_id)));
        Ok(take(rows, fetch))
    }

    async fn add_entry(&self, entry: &CollectionEntry) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().unwrap();
        let exists = state
            .entries
            .iter()
            .any(|e| e.collection_id == entry.collection_id && e.recipe_id == entry.recipe_id);
        if exists {
            return Ok(false);
        }
        state.entries.push(*entry);
        Ok(true)
    }

    async fn remove_entry(&self, collection_id: CollectionId, recipe_id: RecipeId) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().unwrap();
        let before = state.entries.len();
        state
            .entries
            .retain(|e| !(e.collection_id == collection_id && e.recipe_id == recipe_id));
        Ok(state.entries.len() != before)
    }
}

impl InMemoryStore {
    fn follows_where<F>(&self, pred: F, after: Option<FollowKey>, fetch: usize) -> Vec<Follow>
    where
        F: Fn(&Follow) -> Option<UserId>,
    {
        let state = self.state.read().unwrap();
        let mut rows: Vec<(Follow, UserId)> = state
            .follows
            .iter()
            .filter_map(|f| pred(f).map(|other| (*f, other)))
            .filter(|(f, other)| after.is_none_or(|k| (f.created_at, *other) < (k.created_at, k.user_id)))
            .collect();
        rows.sort_by_key(|(f, other)| Reverse((f.created_at, *other)));
        take(rows.into_iter().map(|(f, _)| f).collect(), fetch)
    }
}

impl FollowStore for InMemoryStore {
    async fn list_followers(
        &self,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> Result<Vec<Follow>> {
        self.check_available()?;
        Ok(self.follows_where(
            |f| (f.following_id == user_id).then_some(f.follower_id),
            after,
            fetch,
        ))
    }

    async fn list_following(
        &self,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> Result<Vec<Follow>> {
        self.check_available()?;
        Ok(self.follows_where(
            |f| (f.follower_id == user_id).then_some(f.following_id),
            after,
            fetch,
        ))
    }

    async fn insert_follow(&self, follow: &Follow) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().unwrap();
        let exists = state.follows.iter().any(|f| {
            f.follower_id == follow.follower_id && f.following_id == follow.following_id
        });
        if exists {
            return Err(CoreError::Conflict(format!(
                "user {} already follows {}",
                follow.follower_id, follow.following_id
            )));
        }
        state.follows.push(*follow);
        Ok(())
    }

    async fn delete_follow(&self, follower_id: UserId, following_id: UserId) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().unwrap();
        let before = state.follows.len();
        state
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(state.follows.len() != before)
    }

    async fn count_followers(&self, user_id: UserId) -> Result<u64> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        Ok(state.follows.iter().filter(|f| f.following_id == user_id).count() as u64)
    }

    async fn count_following(&self, user_id: UserId) -> Result<u64> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        Ok(state.follows.iter().filter(|f| f.follower_id == user_id).count() as u64)
    }
}

impl CategoryStore for InMemoryStore {
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        self.check_available()?;
        Ok(self.state.read().unwrap().categories.get(&id).cloned())
    }

    async fn list_categories(&self, after: Option<CategoryKey>, fetch: usize) -> Result<Vec<Category>> {
        self.check_available()?;
        let state = self.state.read().unwrap();
        let mut rows: Vec<Category> = state
            .categories
            .values()
            .filter(|c| c.status.is_active())
            .filter(|c| {
                after
                    .as_ref()
                    .is_none_or(|k| (c.name.as_str(), c.id) > (k.name.as_str(), k.id))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.name.as_str(), a.id).cmp(&(b.name.as_str(), b.id)));
        Ok(take(rows, fetch))
    }
}
