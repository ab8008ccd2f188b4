//! Users and follow relationships.

use crate::{ACTIVE, PostgresStore, db_error, insert_error, limit, to_count};
use recipebox_core::model::{EntityStatus, Follow, User, UserId, UserSummary};
use recipebox_core::store::{FollowKey, FollowStore, UserStore};
use recipebox_core::{CoreError, Result};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

fn user_from_row(row: &PgRow) -> sqlx::Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        email_verified: row.try_get("email_verified")?,
        verification_code: row.try_get("verification_code")?,
        verification_expires_at: row.try_get("verification_expires_at")?,
        created_at: row.try_get("created_at")?,
        status: EntityStatus::from_i16(row.try_get("status")?),
    })
}

fn follow_from_row(row: &PgRow) -> sqlx::Result<Follow> {
    Ok(Follow {
        follower_id: UserId::from_uuid(row.try_get("follower_id")?),
        following_id: UserId::from_uuid(row.try_get("following_id")?),
        created_at: row.try_get("created_at")?,
    })
}

impl UserStore for PostgresStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, full_name, email_verified,
                   verification_code, verification_expires_at, created_at, status
            FROM users
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id.as_uuid())
        .bind(ACTIVE)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get user"))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(db_error("decode user"))
    }

    async fn get_user_summaries(&self, ids: &[UserId]) -> Result<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            "SELECT id, username, full_name FROM users WHERE id = ANY($1) AND status = $2",
        )
        .bind(&ids)
        .bind(ACTIVE)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("get user summaries"))?;

        Ok(rows
            .into_iter()
            .map(|(id, username, full_name)| UserSummary {
                id: UserId::from_uuid(id),
                username,
                full_name,
            })
            .collect())
    }

    async fn update_verification(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET email_verified = $2,
                verification_code = $3,
                verification_expires_at = $4,
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(user.id.as_uuid())
        .bind(user.email_verified)
        .bind(user.verification_code.as_deref())
        .bind(user.verification_expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("update verification"))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("user", user.id));
        }
        Ok(())
    }
}

impl PostgresStore {
    /// One follow listing. `key` is the column matched against `user_id`;
    /// `other` is the column of the listed user, used as the tie-break.
    async fn list_follows(
        &self,
        key: &str,
        other: &str,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> Result<Vec<Follow>> {
        let query = format!(
            r"
            SELECT follower_id, following_id, created_at
            FROM user_followers
            WHERE {key} = $1
              AND ($2::timestamptz IS NULL OR (created_at, {other}) < ($2, $3::uuid))
            ORDER BY created_at DESC, {other} DESC
            LIMIT $4
            "
        );
        let rows = sqlx::query(&query)
            .bind(user_id.as_uuid())
            .bind(after.map(|k| k.created_at))
            .bind(after.map(|k| *k.user_id.as_uuid()))
            .bind(limit(fetch))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list follows"))?;
        rows.iter()
            .map(follow_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(db_error("decode follow"))
    }

    async fn count_follows(&self, key: &str, user_id: UserId) -> Result<u64> {
        let query = format!("SELECT COUNT(*)::BIGINT FROM user_followers WHERE {key} = $1");
        let (count,): (i64,) = sqlx::query_as(&query)
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count follows"))?;
        Ok(to_count(count))
    }
}

impl FollowStore for PostgresStore {
    async fn list_followers(
        &self,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> Result<Vec<Follow>> {
        self.list_follows("following_id", "follower_id", user_id, after, fetch)
            .await
    }

    async fn list_following(
        &self,
        user_id: UserId,
        after: Option<FollowKey>,
        fetch: usize,
    ) -> Result<Vec<Follow>> {
        self.list_follows("follower_id", "following_id", user_id, after, fetch)
            .await
    }

    async fn insert_follow(&self, follow: &Follow) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_followers (follower_id, following_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(follow.follower_id.as_uuid())
        .bind(follow.following_id.as_uuid())
        .bind(follow.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error(
            "insert follow",
            format!(
                "user {} already follows {}",
                follow.follower_id, follow.following_id
            ),
        ))?;
        Ok(())
    }

    async fn delete_follow(&self, follower_id: UserId, following_id: UserId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM user_followers WHERE follower_id = $1 AND following_id = $2")
                .bind(follower_id.as_uuid())
                .bind(following_id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_error("delete follow"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_followers(&self, user_id: UserId) -> Result<u64> {
        self.count_follows("following_id", user_id).await
    }

    async fn count_following(&self, user_id: UserId) -> Result<u64> {
        self.count_follows("follower_id", user_id).await
    }
}
