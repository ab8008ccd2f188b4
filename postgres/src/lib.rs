//! `PostgreSQL` store for Recipebox.
//!
//! [`PostgresStore`] implements every store trait from
//! `recipebox_core::store` over a single connection pool. Queries are
//! runtime-checked (`sqlx::query` with `bind`), so building the crate does
//! not need a live database.
//!
//! Listing queries follow the keyset contracts of the traits:
//!
//! | Listing              | Order                                   |
//! |----------------------|-----------------------------------------|
//! | ratings of a recipe  | `created_at DESC, id DESC`              |
//! | collection entries   | `created_at DESC, recipe_id DESC`       |
//! | followers/following  | `created_at DESC, <listed user> DESC`   |
//! | categories           | `name COLLATE "C" ASC, id ASC`          |
//!
//! Backend failures become [`CoreError::Unavailable`]; unique violations on
//! inserts become [`CoreError::Conflict`].
//!
//! # Example
//!
//! ```no_run
//! use recipebox_postgres::PostgresStore;
//!
//! # async fn example() -> recipebox_core::Result<()> {
//! let store = PostgresStore::connect("postgres://localhost/recipebox", 10).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod ratings;
mod users;

use recipebox_core::model::EntityStatus;
use recipebox_core::{CoreError, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// `status` value of active rows.
const ACTIVE: i16 = EntityStatus::Active.as_i16();

/// Store over a `PostgreSQL` connection pool.
///
/// Cloning is cheap; clones share the pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::Unavailable(format!("Failed to connect: {e}")))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Unavailable`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::Unavailable(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool, for seeding and ad-hoc queries.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a query failure to `Unavailable`, counting it per operation.
fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> CoreError {
    move |e| {
        metrics::counter!("postgres_query_failures_total", "operation" => operation).increment(1);
        tracing::debug!(operation, error = %e, "Query failed");
        CoreError::Unavailable(format!("Failed to {operation}: {e}"))
    }
}

/// Like [`db_error`], but a unique violation becomes `Conflict(message)`.
fn insert_error(operation: &'static str, message: String) -> impl FnOnce(sqlx::Error) -> CoreError {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return CoreError::Conflict(message);
            }
        }
        db_error(operation)(e)
    }
}

/// Convert a stored non-negative count.
fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Convert a count for binding.
fn from_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Clamp a fetch size for a `LIMIT` bind.
fn limit(fetch: usize) -> i64 {
    i64::try_from(fetch).unwrap_or(i64::MAX)
}
