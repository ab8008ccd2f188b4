//! Rating write and listing tests.

#![allow(clippy::unwrap_used)]

use chrono::Duration;
use recipebox_core::CoreError;
use recipebox_core::environment::Clock;
use recipebox_core::model::{EntityStatus, RatingId, RecipeId, UserId};
use recipebox_runtime::RatingAggregateMaintainer;
use recipebox_runtime::ratings::{NewRating, RatingService, RatingUpdate};
use recipebox_testing::{InMemoryStore, ManualClock, fixtures, init_test_tracing, test_time};
use std::sync::Arc;

struct Harness {
    store: Arc<InMemoryStore>,
    clock: ManualClock,
    service: RatingService<InMemoryStore>,
    recipe_id: RecipeId,
}

impl Harness {
    fn new() -> Self {
        init_test_tracing();
        let clock = ManualClock::starting_at(test_time());
        let store = Arc::new(InMemoryStore::new());
        let owner = store.insert_user(fixtures::user("owner", clock.now()));
        let recipe = store.insert_recipe(fixtures::recipe(owner.id, "Ragu", clock.now()));
        let maintainer = Arc::new(RatingAggregateMaintainer::new(Arc::clone(&store)));
        let service = RatingService::new(Arc::clone(&store), maintainer, Arc::new(clock.clone()));
        Self {
            store,
            clock,
            service,
            recipe_id: recipe.id,
        }
    }

    fn user(&self, name: &str) -> UserId {
        self.store.insert_user(fixtures::user(name, self.clock.now())).id
    }

    fn new_rating(&self, user_id: UserId, score: u8) -> NewRating {
        NewRating {
            recipe_id: self.recipe_id,
            user_id,
            score,
            comment: format!("{score} stars"),
        }
    }

    /// Rate the recipe once per score, each a millisecond after the last.
    async fn rate_many(&self, scores: &[u8]) -> Vec<RatingId> {
        let mut ids = Vec::new();
        for (i, score) in scores.iter().enumerate() {
            let user_id = self.user(&format!("rater{i}"));
            let mutation = self
                .service
                .rate_recipe(self.new_rating(user_id, *score))
                .await
                .unwrap();
            ids.push(mutation.rating.id);
            self.clock.advance(Duration::milliseconds(1));
        }
        ids
    }
}

#[tokio::test]
async fn test_rate_recipe_recomputes_aggregate() {
    let h = Harness::new();
    let user_id = h.user("alice");

    let mutation = h.service.rate_recipe(h.new_rating(user_id, 4)).await.unwrap();

    assert_eq!(mutation.rating.score, 4);
    assert!(mutation.aggregate_warning.is_none());
    let aggregate = mutation.aggregate.unwrap();
    assert_eq!(aggregate.rating_count, 1);
    assert_eq!(h.store.recipe(h.recipe_id).unwrap().aggregate, aggregate);
}

#[tokio::test]
async fn test_rating_twice_replaces_the_first() {
    let h = Harness::new();
    let user_id = h.user("alice");

    let first = h.service.rate_recipe(h.new_rating(user_id, 2)).await.unwrap();
    let second = h.service.rate_recipe(h.new_rating(user_id, 5)).await.unwrap();

    assert_eq!(first.rating.id, second.rating.id);
    let aggregate = second.aggregate.unwrap();
    assert_eq!(aggregate.rating_count, 1);
    assert!((aggregate.avg_rating - 5.0).abs() < f64::EPSILON);
    let stored = h.service.get_user_rating(user_id, h.recipe_id).await.unwrap();
    assert_eq!(stored.score, 5);
}

#[tokio::test]
async fn test_out_of_range_score_is_rejected() {
    let h = Harness::new();
    let user_id = h.user("alice");

    for score in [0, 6] {
        let err = h
            .service
            .rate_recipe(h.new_rating(user_id, score))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
    assert_eq!(h.store.summarize_calls(), 0);
}

#[tokio::test]
async fn test_rating_a_deleted_recipe_is_not_found() {
    let h = Harness::new();
    let user_id = h.user("alice");
    let mut recipe = h.store.recipe(h.recipe_id).unwrap();
    recipe.status = EntityStatus::Deleted;
    h.store.insert_recipe(recipe);

    let err = h.service.rate_recipe(h.new_rating(user_id, 3)).await.unwrap_err();

    assert!(matches!(err, CoreError::NotFound { entity: "recipe", .. }));
}

#[tokio::test]
async fn test_update_by_owner() {
    let h = Harness::new();
    let user_id = h.user("alice");
    let created = h.service.rate_recipe(h.new_rating(user_id, 2)).await.unwrap();

    let update = RatingUpdate {
        score: Some(4),
        comment: "better the next day".to_string(),
    };
    let mutation = h
        .service
        .update_rating(created.rating.id, user_id, update)
        .await
        .unwrap();

    assert_eq!(mutation.rating.score, 4);
    assert_eq!(mutation.rating.comment, "better the next day");
    assert!((mutation.aggregate.unwrap().avg_rating - 4.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_update_without_score_keeps_it() {
    let h = Harness::new();
    let user_id = h.user("alice");
    let created = h.service.rate_recipe(h.new_rating(user_id, 3)).await.unwrap();

    let update = RatingUpdate {
        score: None,
        comment: "edited".to_string(),
    };
    let mutation = h
        .service
        .update_rating(created.rating.id, user_id, update)
        .await
        .unwrap();

    assert_eq!(mutation.rating.score, 3);
    assert_eq!(h.store.rating(created.rating.id).unwrap().comment, "edited");
}

#[tokio::test]
async fn test_update_by_other_user_is_forbidden() {
    let h = Harness::new();
    let alice = h.user("alice");
    let mallory = h.user("mallory");
    let created = h.service.rate_recipe(h.new_rating(alice, 5)).await.unwrap();

    let err = h
        .service
        .update_rating(created.rating.id, mallory, RatingUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = h
        .service
        .delete_rating(created.rating.id, mallory)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(h.store.rating(created.rating.id).unwrap().score, 5);
}

#[tokio::test]
async fn test_delete_soft_deletes_and_recomputes() {
    let h = Harness::new();
    let ids = h.rate_many(&[5, 1]).await;
    let author = h.store.rating(ids[1]).unwrap().user_id;

    let mutation = h.service.delete_rating(ids[1], author).await.unwrap();

    assert_eq!(mutation.rating.status, EntityStatus::Deleted);
    let aggregate = mutation.aggregate.unwrap();
    assert_eq!(aggregate.rating_count, 1);
    assert!((aggregate.avg_rating - 5.0).abs() < f64::EPSILON);
    assert!(matches!(
        h.service.get_rating(ids[1]).await.unwrap_err(),
        CoreError::NotFound { .. }
    ));
    assert!(matches!(
        h.service.delete_rating(ids[1], author).await.unwrap_err(),
        CoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_failed_recompute_surfaces_as_warning() {
    let h = Harness::new();
    let user_id = h.user("alice");
    h.store.set_aggregate_writes_failing(true);

    let mutation = h.service.rate_recipe(h.new_rating(user_id, 4)).await.unwrap();

    assert!(mutation.aggregate.is_none());
    assert!(mutation.aggregate_warning.unwrap().is_retryable());
    // The rating itself is stored
    assert!(h.store.rating(mutation.rating.id).is_some());

    h.store.set_aggregate_writes_failing(false);
    let repaired = h.service.repair_aggregate(h.recipe_id).await.unwrap();
    assert_eq!(repaired.rating_count, 1);
}

#[tokio::test]
async fn test_get_user_rating_when_not_rated() {
    let h = Harness::new();
    let user_id = h.user("alice");

    let err = h.service.get_user_rating(user_id, h.recipe_id).await.unwrap_err();

    assert!(matches!(err, CoreError::NotFound { entity: "rating", .. }));
}

#[tokio::test]
async fn test_two_pages_over_three_ratings() {
    let h = Harness::new();
    let ids = h.rate_many(&[3, 4, 5]).await;

    let first = h.service.list_ratings(h.recipe_id, None, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    let cursor = first.next_cursor.clone().unwrap();
    assert!(!cursor.as_str().is_empty());
    // Newest first
    assert_eq!(first.items[0].id, ids[2]);
    assert_eq!(first.items[1].id, ids[1]);

    let second = h
        .service
        .list_ratings(h.recipe_id, Some(cursor.as_str()), 2)
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second.items[0].id, ids[0]);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_ratings_sharing_a_timestamp_are_not_skipped() {
    let h = Harness::new();
    let now = h.clock.now();
    let mut expected: Vec<RatingId> = (0..5)
        .map(|i| {
            let user_id = h.user(&format!("twin{i}"));
            h.store
                .seed_rating(fixtures::rating(h.recipe_id, user_id, 3, now))
                .id
        })
        .collect();
    expected.sort_unstable_by(|a, b| b.cmp(a));

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = h
            .service
            .list_ratings(h.recipe_id, cursor.as_deref(), 2)
            .await
            .unwrap();
        seen.extend(page.items.iter().map(|r| r.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next.into_string()),
            None => break,
        }
    }

    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_malformed_cursor_is_rejected() {
    let h = Harness::new();
    h.rate_many(&[3]).await;

    let err = h
        .service
        .list_ratings(h.recipe_id, Some("not-a-cursor"), 10)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidCursor(_)));
}

#[tokio::test]
async fn test_cursor_from_another_recipe_is_rejected() {
    let h = Harness::new();
    let ids = h.rate_many(&[3, 4]).await;
    let owner = h.user("other-owner");
    let other = h
        .store
        .insert_recipe(fixtures::recipe(owner, "Other", h.clock.now()));

    let page = h.service.list_ratings(h.recipe_id, None, 1).await.unwrap();
    let cursor = page.next_cursor.unwrap();
    assert_eq!(page.items[0].id, ids[1]);

    let err = h
        .service
        .list_ratings(other.id, Some(cursor.as_str()), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCursor(_)));
}

#[tokio::test]
async fn test_cursor_survives_deletion_of_its_rating() {
    let h = Harness::new();
    let ids = h.rate_many(&[1, 2, 3]).await;

    let first = h.service.list_ratings(h.recipe_id, None, 1).await.unwrap();
    let cursor = first.next_cursor.unwrap();
    let author = h.store.rating(ids[2]).unwrap().user_id;
    h.service.delete_rating(ids[2], author).await.unwrap();

    let rest = h
        .service
        .list_ratings(h.recipe_id, Some(cursor.as_str()), 10)
        .await
        .unwrap();
    let rest: Vec<RatingId> = rest.items.iter().map(|r| r.id).collect();
    assert_eq!(rest, vec![ids[1], ids[0]]);
}

#[tokio::test]
async fn test_limit_is_clamped() {
    let h = Harness::new();
    let scores: Vec<u8> = (0..12).map(|i| (i % 5) + 1).collect();
    h.rate_many(&scores).await;

    let defaulted = h.service.list_ratings(h.recipe_id, None, 0).await.unwrap();
    assert_eq!(defaulted.len(), 10);
    assert!(defaulted.has_more());

    let capped = h.service.list_ratings(h.recipe_id, None, 500).await.unwrap();
    assert_eq!(capped.len(), 12);
    assert!(!capped.has_more());
}

#[tokio::test]
async fn test_authors_that_no_longer_exist_get_a_placeholder() {
    let h = Harness::new();
    let ids = h.rate_many(&[4, 5]).await;
    let gone = h.store.rating(ids[0]).unwrap().user_id;
    let kept = h.store.rating(ids[1]).unwrap().user_id;
    h.store.remove_user(gone);

    let page = h
        .service
        .list_ratings_with_authors(h.recipe_id, None, 10)
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page.items[0].author.id, kept);
    assert_eq!(page.items[0].author.username, "rater1");
    assert_eq!(page.items[1].author.id, gone);
    assert!(page.items[1].author.username.is_empty());
}
