//! Collections, collection membership and categories.

use crate::{ACTIVE, PostgresStore, db_error, limit};
use recipebox_core::model::{
    Category, CategoryId, Collection, CollectionEntry, CollectionId, EntityStatus, RecipeId,
    UserId,
};
use recipebox_core::store::{CategoryKey, CategoryStore, CollectionStore, EntryKey};
use recipebox_core::{DateTime, Result, Utc};
use uuid::Uuid;

impl CollectionStore for PostgresStore {
    async fn get_collection(&self, id: CollectionId) -> Result<Option<Collection>> {
        let row: Option<(Uuid, Uuid, String, i16)> = sqlx::query_as(
            "SELECT id, user_id, name, status FROM collections WHERE id = $1 AND status = $2",
        )
        .bind(id.as_uuid())
        .bind(ACTIVE)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get collection"))?;

        Ok(row.map(|(id, user_id, name, status)| Collection {
            id: CollectionId::from_uuid(id),
            user_id: UserId::from_uuid(user_id),
            name,
            status: EntityStatus::from_i16(status),
        }))
    }

    async fn list_entries(
        &self,
        collection_id: CollectionId,
        after: Option<EntryKey>,
        fetch: usize,
    ) -> Result<Vec<CollectionEntry>> {
        let rows: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            r"
            SELECT recipe_id, created_at
            FROM recipe_collections
            WHERE collection_id = $1
              AND ($2::timestamptz IS NULL OR (created_at, recipe_id) < ($2, $3::uuid))
            ORDER BY created_at DESC, recipe_id DESC
            LIMIT $4
            ",
        )
        .bind(collection_id.as_uuid())
        .bind(after.map(|k| k.added_at))
        .bind(after.map(|k| *k.recipe_id.as_uuid()))
        .bind(limit(fetch))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list collection entries"))?;

        Ok(rows
            .into_iter()
            .map(|(recipe_id, added_at)| CollectionEntry {
                collection_id,
                recipe_id: RecipeId::from_uuid(recipe_id),
                added_at,
            })
            .collect())
    }

    async fn add_entry(&self, entry: &CollectionEntry) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO recipe_collections (collection_id, recipe_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection_id, recipe_id) DO NOTHING
            ",
        )
        .bind(entry.collection_id.as_uuid())
        .bind(entry.recipe_id.as_uuid())
        .bind(entry.added_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("add collection entry"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_entry(&self, collection_id: CollectionId, recipe_id: RecipeId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM recipe_collections WHERE collection_id = $1 AND recipe_id = $2")
                .bind(collection_id.as_uuid())
                .bind(recipe_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_error("remove collection entry"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn category((id, name, status): (Uuid, String, i16)) -> Category {
    Category {
        id: CategoryId::from_uuid(id),
        name,
        status: EntityStatus::from_i16(status),
    }
}

impl CategoryStore for PostgresStore {
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row: Option<(Uuid, String, i16)> =
            sqlx::query_as("SELECT id, name, status FROM categories WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get category"))?;
        Ok(row.map(category))
    }

    async fn list_categories(&self, after: Option<CategoryKey>, fetch: usize) -> Result<Vec<Category>> {
        // Byte-wise collation keeps the order identical to Rust string comparison.
        let (name, id) = after.map_or((None, None), |k| (Some(k.name), Some(*k.id.as_uuid())));
        let rows: Vec<(Uuid, String, i16)> = sqlx::query_as(
            r#"
            SELECT id, name, status
            FROM categories
            WHERE status = $1
              AND ($2::text IS NULL OR (name COLLATE "C", id) > ($2::text COLLATE "C", $3::uuid))
            ORDER BY name COLLATE "C" ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(ACTIVE)
        .bind(name)
        .bind(id)
        .bind(limit(fetch))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list categories"))?;
        Ok(rows.into_iter().map(category).collect())
    }
}
