//! Collection, follow and category listing tests.

#![allow(clippy::unwrap_used)]

use chrono::Duration;
use recipebox_core::CoreError;
use recipebox_core::cursor::CursorCodec;
use recipebox_core::environment::Clock;
use recipebox_core::model::{EntityStatus, Follow, RecipeId, UserId};
use recipebox_runtime::categories::CategoryService;
use recipebox_runtime::collections::CollectionService;
use recipebox_runtime::follows::FollowService;
use recipebox_testing::{InMemoryStore, ManualClock, fixtures, init_test_tracing, test_time};
use std::sync::Arc;

fn setup() -> (Arc<InMemoryStore>, ManualClock) {
    init_test_tracing();
    (
        Arc::new(InMemoryStore::new()),
        ManualClock::starting_at(test_time()),
    )
}

// ----- collections -----

#[tokio::test]
async fn test_collection_pages_newest_first() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Weeknight")).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let mut added: Vec<RecipeId> = Vec::new();
    for i in 0..5 {
        let recipe = store.insert_recipe(fixtures::recipe(owner, &format!("Dish {i}"), clock.now()));
        service.add_recipe(collection, recipe.id, owner).await.unwrap();
        added.push(recipe.id);
        clock.advance(Duration::seconds(1));
    }

    let first = service.list_collection_recipes(collection, None, 3).await.unwrap();
    let cursor = first.next_cursor.clone().unwrap();
    let second = service
        .list_collection_recipes(collection, Some(cursor.as_str()), 3)
        .await
        .unwrap();

    let seen: Vec<RecipeId> = first
        .items
        .iter()
        .chain(second.items.iter())
        .map(|r| r.id)
        .collect();
    added.reverse();
    assert_eq!(seen, added);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn test_collection_entries_sharing_a_millisecond_all_appear_once() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Batch")).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    // The clock never moves, so every entry has the same added_at
    let mut added: Vec<RecipeId> = Vec::new();
    for i in 0..4 {
        let recipe = store.insert_recipe(fixtures::recipe(owner, &format!("Dish {i}"), clock.now()));
        service.add_recipe(collection, recipe.id, owner).await.unwrap();
        added.push(recipe.id);
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = service
            .list_collection_recipes(collection, cursor.as_deref(), 2)
            .await
            .unwrap();
        seen.extend(page.items.iter().map(|r| r.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next.into_string()),
            None => break,
        }
    }

    added.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(seen, added);
}

#[tokio::test]
async fn test_timestamp_only_cursor_is_invalid_for_collections() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Mine")).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let codec = CursorCodec::new(Arc::new(clock.clone()));
    let bare = codec.encode_time(clock.now());
    let err = service
        .list_collection_recipes(collection, Some(bare.as_str()), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCursor(_)));
}

#[tokio::test]
async fn test_adding_twice_keeps_one_entry() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Soups")).id;
    let recipe = store.insert_recipe(fixtures::recipe(owner, "Pho", clock.now())).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    service.add_recipe(collection, recipe, owner).await.unwrap();
    clock.advance(Duration::seconds(5));
    service.add_recipe(collection, recipe, owner).await.unwrap();

    let page = service.list_collection_recipes(collection, None, 10).await.unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_only_the_owner_changes_a_collection() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let stranger = store.insert_user(fixtures::user("stranger", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Mine")).id;
    let recipe = store.insert_recipe(fixtures::recipe(owner, "Toast", clock.now())).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let err = service.add_recipe(collection, recipe, stranger).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    service.add_recipe(collection, recipe, owner).await.unwrap();
    let err = service
        .remove_recipe(collection, recipe, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[tokio::test]
async fn test_remove_missing_member_is_not_found() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Empty")).id;
    let recipe = store.insert_recipe(fixtures::recipe(owner, "Toast", clock.now())).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let err = service.remove_recipe(collection, recipe, owner).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));

    service.add_recipe(collection, recipe, owner).await.unwrap();
    service.remove_recipe(collection, recipe, owner).await.unwrap();
    assert!(service
        .list_collection_recipes(collection, None, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_deleted_recipes_are_left_out_but_paging_continues() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Mixed")).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let mut recipes = Vec::new();
    for i in 0..4 {
        let recipe = store.insert_recipe(fixtures::recipe(owner, &format!("Dish {i}"), clock.now()));
        service.add_recipe(collection, recipe.id, owner).await.unwrap();
        recipes.push(recipe);
        clock.advance(Duration::seconds(1));
    }
    // Newest two entries point at deleted recipes
    for recipe in &recipes[2..] {
        let mut deleted = recipe.clone();
        deleted.status = EntityStatus::Deleted;
        store.insert_recipe(deleted);
    }

    let first = service.list_collection_recipes(collection, None, 2).await.unwrap();
    assert!(first.is_empty());
    assert!(first.has_more());

    let second = service
        .list_collection_recipes(collection, first.next_cursor.as_ref().map(|c| c.as_str()), 2)
        .await
        .unwrap();
    let ids: Vec<RecipeId> = second.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![recipes[1].id, recipes[0].id]);
}

#[tokio::test]
async fn test_future_cursor_restarts_the_listing() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Future")).id;
    let recipe = store.insert_recipe(fixtures::recipe(owner, "Soup", clock.now())).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));
    service.add_recipe(collection, recipe, owner).await.unwrap();

    let codec = CursorCodec::new(Arc::new(clock.clone()));
    let far_future = codec.encode_keyset(clock.now() + Duration::days(30), recipe.as_uuid());

    let page = service
        .list_collection_recipes(collection, Some(far_future.as_str()), 10)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_identifier_cursor_on_timestamp_listing_is_invalid() {
    let (store, clock) = setup();
    let owner = store.insert_user(fixtures::user("owner", clock.now())).id;
    let collection = store.insert_collection(fixtures::collection(owner, "Mine")).id;
    let service = CollectionService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let random = uuid::Uuid::new_v4().to_string();
    let err = service
        .list_collection_recipes(collection, Some(random.as_str()), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCursor(_)));
}

// ----- follows -----

#[tokio::test]
async fn test_follow_counts_and_unfollow() {
    let (store, clock) = setup();
    let alice = store.insert_user(fixtures::user("alice", clock.now())).id;
    let bob = store.insert_user(fixtures::user("bob", clock.now())).id;
    let service = FollowService::new(Arc::clone(&store), Arc::new(clock.clone()));

    service.follow(alice, bob).await.unwrap();
    assert_eq!(service.follower_count(bob).await.unwrap(), 1);
    assert_eq!(service.following_count(alice).await.unwrap(), 1);

    let err = service.follow(alice, bob).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    service.unfollow(alice, bob).await.unwrap();
    assert_eq!(service.follower_count(bob).await.unwrap(), 0);
    let err = service.unfollow(alice, bob).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_self_follow_is_rejected() {
    let (store, clock) = setup();
    let alice = store.insert_user(fixtures::user("alice", clock.now())).id;
    let service = FollowService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let err = service.follow(alice, alice).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_follow_unknown_user_is_not_found() {
    let (store, clock) = setup();
    let alice = store.insert_user(fixtures::user("alice", clock.now())).id;
    let service = FollowService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let err = service.follow(alice, UserId::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "user", .. }));
}

#[tokio::test]
async fn test_followers_and_following_pages() {
    let (store, clock) = setup();
    let star = store.insert_user(fixtures::user("star", clock.now())).id;
    let service = FollowService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let mut fans = Vec::new();
    for i in 0..3 {
        let fan = store.insert_user(fixtures::user(&format!("fan{i}"), clock.now())).id;
        service.follow(fan, star).await.unwrap();
        fans.push(fan);
        clock.advance(Duration::milliseconds(250));
    }

    let first = service.list_followers(star, None, 2).await.unwrap();
    let ids: Vec<UserId> = first.items.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![fans[2], fans[1]]);

    let cursor = first.next_cursor.unwrap();
    let second = service
        .list_followers(star, Some(cursor.as_str()), 2)
        .await
        .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].id, fans[0]);
    assert_eq!(second.items[0].username, "fan0");
    assert!(second.next_cursor.is_none());

    let following = service.list_following(fans[0], None, 10).await.unwrap();
    assert_eq!(following.items.len(), 1);
    assert_eq!(following.items[0].id, star);
}

#[tokio::test]
async fn test_follows_sharing_a_millisecond_all_appear_once() {
    let (store, clock) = setup();
    let star = store.insert_user(fixtures::user("star", clock.now())).id;
    let service = FollowService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let mut fans = Vec::new();
    for i in 0..4 {
        let fan = store.insert_user(fixtures::user(&format!("fan{i}"), clock.now())).id;
        service.follow(fan, star).await.unwrap();
        service.follow(star, fan).await.unwrap();
        fans.push(fan);
    }

    let mut followers = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = service.list_followers(star, cursor.as_deref(), 2).await.unwrap();
        followers.extend(page.items.iter().map(|u| u.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next.into_string()),
            None => break,
        }
    }

    let mut following = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = service.list_following(star, cursor.as_deref(), 3).await.unwrap();
        following.extend(page.items.iter().map(|u| u.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next.into_string()),
            None => break,
        }
    }

    fans.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(followers, fans);
    assert_eq!(following, fans);
}

#[tokio::test]
async fn test_missing_users_are_skipped_in_follow_listings() {
    let (store, clock) = setup();
    let star = store.insert_user(fixtures::user("star", clock.now())).id;
    let ghost = UserId::new();
    store.seed_follow(Follow {
        follower_id: ghost,
        following_id: star,
        created_at: clock.now(),
    });
    let service = FollowService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let page = service.list_followers(star, None, 10).await.unwrap();
    assert!(page.is_empty());
    assert!(page.next_cursor.is_none());
}

// ----- categories -----

#[tokio::test]
async fn test_categories_page_by_name() {
    let (store, clock) = setup();
    for name in ["Soups", "Breakfast", "Desserts", "Appetizers", "Mains"] {
        store.insert_category(fixtures::category(name));
    }
    let service = CategoryService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let mut names = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = service.list_categories(cursor.as_deref(), 2).await.unwrap();
        names.extend(page.items.iter().map(|c| c.name.clone()));
        match page.next_cursor {
            Some(next) => cursor = Some(next.into_string()),
            None => break,
        }
    }

    assert_eq!(names, ["Appetizers", "Breakfast", "Desserts", "Mains", "Soups"]);
}

#[tokio::test]
async fn test_deleted_categories_are_hidden() {
    let (store, clock) = setup();
    store.insert_category(fixtures::category("Visible"));
    let mut hidden = fixtures::category("Hidden");
    hidden.status = EntityStatus::Deleted;
    let hidden = store.insert_category(hidden);
    let service = CategoryService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let page = service.list_categories(None, 10).await.unwrap();
    assert_eq!(page.len(), 1);
    assert!(matches!(
        service.get_category(hidden.id).await.unwrap_err(),
        CoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_unknown_category_cursor_is_invalid() {
    let (store, clock) = setup();
    store.insert_category(fixtures::category("Only"));
    let service = CategoryService::new(Arc::clone(&store), Arc::new(clock.clone()));

    let unknown = uuid::Uuid::new_v4().to_string();
    let err = service
        .list_categories(Some(unknown.as_str()), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCursor(_)));
}
