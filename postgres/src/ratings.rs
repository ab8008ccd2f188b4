//! Recipes, ratings and the rating aggregate.

use crate::{ACTIVE, PostgresStore, db_error, from_count, insert_error, limit, to_count};
use recipebox_core::model::{
    CategoryId, EntityStatus, Rating, RatingAggregate, RatingId, RatingSummary, Recipe, RecipeId,
    UserId,
};
use recipebox_core::store::{RatingAggregateStore, RatingKey, RatingStore, RecipeStore};
use recipebox_core::{CoreError, Result};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

const RECIPE_COLUMNS: &str =
    "id, user_id, title, category_id, rating_count, avg_rating, created_at, updated_at, status";

const RATING_COLUMNS: &str =
    "id, recipe_id, user_id, score, comment, created_at, updated_at, status";

fn recipe_from_row(row: &PgRow) -> sqlx::Result<Recipe> {
    Ok(Recipe {
        id: RecipeId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        title: row.try_get("title")?,
        category_id: row
            .try_get::<Option<Uuid>, _>("category_id")?
            .map(CategoryId::from_uuid),
        aggregate: RatingAggregate {
            rating_count: to_count(row.try_get("rating_count")?),
            avg_rating: row.try_get("avg_rating")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        status: EntityStatus::from_i16(row.try_get("status")?),
    })
}

fn rating_from_row(row: &PgRow) -> sqlx::Result<Rating> {
    let score: i16 = row.try_get("score")?;
    Ok(Rating {
        id: RatingId::from_uuid(row.try_get("id")?),
        recipe_id: RecipeId::from_uuid(row.try_get("recipe_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        score: u8::try_from(score).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        status: EntityStatus::from_i16(row.try_get("status")?),
    })
}

impl RatingAggregateStore for PostgresStore {
    async fn list_active_recipe_ids(&self) -> Result<Vec<RecipeId>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM recipes WHERE status = $1 ORDER BY id")
            .bind(ACTIVE)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list active recipes"))?;
        Ok(ids.into_iter().map(|(id,)| RecipeId::from_uuid(id)).collect())
    }

    async fn summarize_active_ratings(&self, recipe_id: RecipeId) -> Result<RatingSummary> {
        let (count, total): (i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*)::BIGINT, COALESCE(SUM(score), 0)::BIGINT
            FROM recipe_ratings
            WHERE recipe_id = $1 AND status = $2
            ",
        )
        .bind(recipe_id.as_uuid())
        .bind(ACTIVE)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("summarize ratings"))?;

        Ok(RatingSummary {
            count: to_count(count),
            total: to_count(total),
        })
    }

    async fn update_rating_aggregate(
        &self,
        recipe_id: RecipeId,
        aggregate: RatingAggregate,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE recipes SET rating_count = $2, avg_rating = $3 WHERE id = $1")
            .bind(recipe_id.as_uuid())
            .bind(from_count(aggregate.rating_count))
            .bind(aggregate.avg_rating)
            .execute(&self.pool)
            .await
            .map_err(db_error("update rating aggregate"))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("recipe", recipe_id));
        }
        Ok(())
    }
}

impl RecipeStore for PostgresStore {
    async fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>> {
        let query = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get recipe"))?;
        row.as_ref()
            .map(recipe_from_row)
            .transpose()
            .map_err(db_error("decode recipe"))
    }

    async fn get_active_recipes(&self, ids: &[RecipeId]) -> Result<Vec<Recipe>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let query = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ANY($1) AND status = $2");
        let rows = sqlx::query(&query)
            .bind(&ids)
            .bind(ACTIVE)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("get recipes"))?;
        rows.iter()
            .map(recipe_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(db_error("decode recipe"))
    }
}

impl RatingStore for PostgresStore {
    async fn get_rating(&self, id: RatingId) -> Result<Option<Rating>> {
        let query = format!("SELECT {RATING_COLUMNS} FROM recipe_ratings WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get rating"))?;
        row.as_ref()
            .map(rating_from_row)
            .transpose()
            .map_err(db_error("decode rating"))
    }

    async fn find_active_rating(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<Option<Rating>> {
        let query = format!(
            "SELECT {RATING_COLUMNS} FROM recipe_ratings WHERE user_id = $1 AND recipe_id = $2 AND status = $3"
        );
        let row = sqlx::query(&query)
            .bind(user_id.as_uuid())
            .bind(recipe_id.as_uuid())
            .bind(ACTIVE)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find rating"))?;
        row.as_ref()
            .map(rating_from_row)
            .transpose()
            .map_err(db_error("decode rating"))
    }

    async fn insert_rating(&self, rating: &Rating) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO recipe_ratings
                (id, recipe_id, user_id, score, comment, created_at, updated_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(rating.id.as_uuid())
        .bind(rating.recipe_id.as_uuid())
        .bind(rating.user_id.as_uuid())
        .bind(i16::from(rating.score))
        .bind(&rating.comment)
        .bind(rating.created_at)
        .bind(rating.updated_at)
        .bind(rating.status.as_i16())
        .execute(&self.pool)
        .await
        .map_err(insert_error(
            "insert rating",
            format!(
                "user {} already rated recipe {}",
                rating.user_id, rating.recipe_id
            ),
        ))?;
        Ok(())
    }

    async fn update_rating(&self, rating: &Rating) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE recipe_ratings
            SET score = $2, comment = $3, status = $4, updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(rating.id.as_uuid())
        .bind(i16::from(rating.score))
        .bind(&rating.comment)
        .bind(rating.status.as_i16())
        .bind(rating.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("update rating"))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("rating", rating.id));
        }
        Ok(())
    }

    async fn list_ratings(
        &self,
        recipe_id: RecipeId,
        after: Option<RatingKey>,
        fetch: usize,
    ) -> Result<Vec<Rating>> {
        let query = format!(
            r"
            SELECT {RATING_COLUMNS}
            FROM recipe_ratings
            WHERE recipe_id = $1 AND status = $2
              AND ($3::timestamptz IS NULL OR (created_at, id) < ($3, $4::uuid))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
            "
        );
        let rows = sqlx::query(&query)
            .bind(recipe_id.as_uuid())
            .bind(ACTIVE)
            .bind(after.map(|k| k.created_at))
            .bind(after.map(|k| *k.id.as_uuid()))
            .bind(limit(fetch))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list ratings"))?;
        rows.iter()
            .map(rating_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(db_error("decode rating"))
    }
}
