//! SQLite database operations
//!
//! All database access goes through this module. Every call is bounded by
//! the configured query timeout; dropping the calling future cancels it.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Connection, Pool, Sqlite};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::models::Post;
use crate::error::AppError;
use crate::metrics::DB_QUERY_DURATION_SECONDS;

/// Hard cap on the number of posts returned by a listing.
pub const RECENT_POSTS_LIMIT: u32 = 100;

/// Database connection pool wrapper.
///
/// Constructed once at startup and shared through `AppState`; the pool does
/// its own locking, so callers issue single statements without coordination.
pub struct Database {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl Database {
    /// Connect to the database and apply migrations
    ///
    /// # Arguments
    /// * `url` - Data-source string, e.g. "sqlite:news_project.db?mode=rwc"
    /// * `max_connections` - Pool size
    /// * `query_timeout` - Deadline for each repository operation
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(
        url: &str,
        max_connections: u32,
        query_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(query_timeout)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self {
            pool,
            query_timeout,
        })
    }

    /// Round-trip to the backend to prove connectivity.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.run_until(self.deadline(), "ping", async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        })
        .await
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) async fn run_until<T, F>(
        &self,
        deadline: Instant,
        operation: &'static str,
        query: F,
    ) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let _timer = DB_QUERY_DURATION_SECONDS
            .with_label_values(&[operation])
            .start_timer();

        match tokio::time::timeout_at(deadline, query).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.query_timeout, "Database call timed out");
                Err(AppError::Timeout(self.query_timeout))
            }
        }
    }

    pub(crate) fn deadline(&self) -> Instant {
        Instant::now() + self.query_timeout
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Newest posts first, at most `RECENT_POSTS_LIMIT` regardless of `limit`.
    pub async fn list_recent_posts(&self, limit: u32) -> Result<Vec<Post>, AppError> {
        let limit = limit.min(RECENT_POSTS_LIMIT);

        self.run_until(
            self.deadline(),
            "list_recent_posts",
            sqlx::query_as::<_, Post>(
                r#"
                SELECT id, image_url, caption, created_at
                FROM posts
                ORDER BY id DESC
                LIMIT ?
                "#,
            )
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Insert a post and return it as stored.
    ///
    /// `created_at` is re-read from the database after the insert. If that
    /// read fails the local clock is used instead, so the returned timestamp
    /// may differ slightly from the persisted one.
    pub async fn insert_post(&self, caption: &str, image_url: &str) -> Result<Post, AppError> {
        let deadline = self.deadline();

        let result = self
            .run_until(
                deadline,
                "insert_post",
                sqlx::query("INSERT INTO posts (image_url, caption) VALUES (?, ?)")
                    .bind(image_url)
                    .bind(caption)
                    .execute(&self.pool),
            )
            .await?;
        let id = result.last_insert_rowid();

        let created_at = self.created_at_or_now(id, deadline).await;

        Ok(Post {
            id,
            caption: caption.to_string(),
            image_url: image_url.to_string(),
            created_at,
        })
    }

    /// Stored `created_at` of a row, or the local clock if it cannot be read.
    pub(crate) async fn created_at_or_now(&self, id: i64, deadline: Instant) -> DateTime<Utc> {
        let stored = self
            .run_until(
                deadline,
                "select_created_at",
                sqlx::query_scalar::<_, DateTime<Utc>>("SELECT created_at FROM posts WHERE id = ?")
                    .bind(id)
                    .fetch_one(&self.pool),
            )
            .await;

        match stored {
            Ok(created_at) => created_at,
            Err(error) => {
                tracing::warn!(post_id = id, %error, "Could not re-read created_at; using local clock");
                Utc::now()
            }
        }
    }

    /// Fetch a single post.
    ///
    /// # Errors
    /// `AppError::NotFound` when no row has this id.
    pub async fn get_post(&self, id: i64) -> Result<Post, AppError> {
        self.run_until(
            self.deadline(),
            "get_post",
            sqlx::query_as::<_, Post>(
                r#"
                SELECT id, image_url, caption, created_at
                FROM posts
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }
}
