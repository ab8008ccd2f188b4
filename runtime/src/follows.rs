//! Follow relationships and the follower/following listings.

use crate::config::CursorConfig;
use recipebox_core::cursor::CursorCodec;
use recipebox_core::environment::Clock;
use recipebox_core::model::{Follow, UserId, UserSummary, to_millis_precision};
use recipebox_core::pagination::{Page, PageLimits};
use recipebox_core::store::{FollowKey, FollowStore, UserStore};
use recipebox_core::{CoreError, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

impl Direction {
    /// The user a listing in this direction shows for `follow`.
    const fn listed(self, follow: &Follow) -> UserId {
        match self {
            Self::Followers => follow.follower_id,
            Self::Following => follow.following_id,
        }
    }
}

/// Follow operations.
pub struct FollowService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    codec: CursorCodec,
    limits: PageLimits,
}

impl<S> FollowService<S>
where
    S: FollowStore + UserStore,
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

    /// Make `follower_id` follow `following_id`.
    ///
    /// # Errors
    ///
    /// - `Validation` if a user tries to follow themselves
    /// - `NotFound` if either user does not exist
    /// - `Conflict` if the relationship already exists
    /// - `Unavailable` if the store fails
    pub async fn follow(&self, follower_id: UserId, following_id: UserId) -> Result<Follow> {
        if follower_id == following_id {
            return Err(CoreError::Validation("users cannot follow themselves".to_string()));
        }
        self.require_user(follower_id).await?;
        self.require_user(following_id).await?;

        let follow = Follow {
            follower_id,
            following_id,
            created_at: to_millis_precision(self.clock.now()),
        };
        self.store.insert_follow(&follow).await?;
        tracing::debug!(follower_id = %follower_id, following_id = %following_id, "Follow created");
        Ok(follow)
    }

    /// Remove a follow relationship.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the relationship does not exist
    /// - `Unavailable` if the store fails
    pub async fn unfollow(&self, follower_id: UserId, following_id: UserId) -> Result<()> {
        if !self.store.delete_follow(follower_id, following_id).await? {
            return Err(CoreError::not_found(
                "follow",
                format!("{follower_id} -> {following_id}"),
            ));
        }
        tracing::debug!(follower_id = %follower_id, following_id = %following_id, "Follow removed");
        Ok(())
    }

    /// Number of users following `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store fails.
    pub async fn follower_count(&self, user_id: UserId) -> Result<u64> {
        self.store.count_followers(user_id).await
    }

    /// Number of users `user_id` follows.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store fails.
    pub async fn following_count(&self, user_id: UserId) -> Result<u64> {
        self.store.count_following(user_id).await
    }

    /// Users following `user_id`, most recent follow first.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    /// - `InvalidCursor` if the cursor is malformed
    /// - `Unavailable` if the store fails
    pub async fn list_followers(
        &self,
        user_id: UserId,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Page<UserSummary>> {
        self.list(Direction::Followers, user_id, cursor, limit).await
    }

    /// Users `user_id` follows, most recent follow first.
    ///
    /// # Errors
    ///
    /// Same as [`list_followers`](Self::list_followers).
    pub async fn list_following(
        &self,
        user_id: UserId,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Page<UserSummary>> {
        self.list(Direction::Following, user_id, cursor, limit).await
    }

    async fn list(
        &self,
        direction: Direction,
        user_id: UserId,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Page<UserSummary>> {
        self.require_user(user_id).await?;
        let limit = self.limits.clamp(limit);
        let after = self
            .codec
            .decode_keyset(cursor)?
            .map(|(created_at, id)| FollowKey {
                created_at,
                user_id: UserId::from_uuid(id),
            });
        let fetch = PageLimits::fetch_size(limit);

        let follows = self.fetch(direction, user_id, after, fetch).await?;
        let page = Page::from_overfetch(follows, limit, |last| {
            self.codec
                .encode_keyset(last.created_at, direction.listed(last).as_uuid())
        });

        let ids: Vec<UserId> = page.items.iter().map(|f| direction.listed(f)).collect();
        let mut users: HashMap<UserId, UserSummary> = self
            .store
            .get_user_summaries(&ids)
            .await?
            .into_iter()
            .map(|summary| (summary.id, summary))
            .collect();

        Ok(page.map_items(|follows| {
            follows
                .iter()
                .filter_map(|follow| users.remove(&direction.listed(follow)))
                .collect()
        }))
    }

    async fn fetch(
        &self,
        direction: Direction,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> Result<Vec<Follow>> {
        match direction {
            Direction::Followers => self.store.list_followers(user_id, after, fetch).await,
            Direction::Following => self.store.list_following(user_id, after, fetch).await,
        }
    }

    async fn require_user(&self, user_id: UserId) -> Result<()> {
        match self.store.get_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::not_found("user", user_id)),
        }
    }
}
