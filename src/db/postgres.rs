use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{missing_platform_message, Repository};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{NewPlatform, NewReview, NewTitle, PlatformRow, ReviewFilter, ReviewRow, TitleRow},
    pagination::{Slice, Window},
    services::ratings::RatingStats,
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

const TITLE_COLUMNS: &str = "w.id, w.title, w.storyline, w.active, w.average_rating, \
     w.rating_count, w.platform_id, p.name AS platform_name, w.created";

const REVIEW_COLUMNS: &str = "id, rating, description, active, review_user_id, review_user, \
     watchlist_id, created, updated";

const REVIEW_FILTER: &str = "($1::BIGINT IS NULL OR watchlist_id = $1) \
     AND ($2::TEXT IS NULL OR review_user = $2) \
     AND ($3::BOOLEAN IS NULL OR active = $3)";

/// Repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Translates a foreign key failure on `platform_id` into a field error
fn map_platform_fk(platform_id: i64) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return AppError::invalid("platform", missing_platform_message(platform_id));
            }
        }
        AppError::Database(e)
    }
}

fn map_review_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::DuplicateReview;
        }
    }
    AppError::Database(e)
}

#[async_trait]
impl Repository for PgRepository {
    async fn list_platforms(&self, window: Window) -> AppResult<Slice<PlatformRow>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stream_platforms")
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, PlatformRow>(
            "SELECT id, name, about, website FROM stream_platforms ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Slice { items, total })
    }

    async fn titles_for_platforms(&self, platform_ids: &[i64]) -> AppResult<Vec<TitleRow>> {
        if platform_ids.is_empty() {
            return Ok(Vec::new());
        }

        let titles = sqlx::query_as::<_, TitleRow>(&format!(
            "SELECT {TITLE_COLUMNS} FROM watchlist w \
             JOIN stream_platforms p ON p.id = w.platform_id \
             WHERE w.platform_id = ANY($1) ORDER BY w.id"
        ))
        .bind(platform_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(titles)
    }

    async fn get_platform(&self, id: i64) -> AppResult<Option<PlatformRow>> {
        let platform = sqlx::query_as::<_, PlatformRow>(
            "SELECT id, name, about, website FROM stream_platforms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(platform)
    }

    async fn create_platform(&self, platform: NewPlatform) -> AppResult<PlatformRow> {
        let row = sqlx::query_as::<_, PlatformRow>(
            "INSERT INTO stream_platforms (name, about, website) VALUES ($1, $2, $3) \
             RETURNING id, name, about, website",
        )
        .bind(platform.name)
        .bind(platform.about)
        .bind(platform.website)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_platform(
        &self,
        id: i64,
        platform: NewPlatform,
    ) -> AppResult<Option<PlatformRow>> {
        let row = sqlx::query_as::<_, PlatformRow>(
            "UPDATE stream_platforms SET name = $1, about = $2, website = $3 WHERE id = $4 \
             RETURNING id, name, about, website",
        )
        .bind(platform.name)
        .bind(platform.about)
        .bind(platform.website)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_platform(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM stream_platforms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_titles(&self, window: Window) -> AppResult<Slice<TitleRow>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM watchlist")
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, TitleRow>(&format!(
            "SELECT {TITLE_COLUMNS} FROM watchlist w \
             JOIN stream_platforms p ON p.id = w.platform_id \
             ORDER BY w.id LIMIT $1 OFFSET $2"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Slice { items, total })
    }

    async fn get_title(&self, id: i64) -> AppResult<Option<TitleRow>> {
        let title = sqlx::query_as::<_, TitleRow>(&format!(
            "SELECT {TITLE_COLUMNS} FROM watchlist w \
             JOIN stream_platforms p ON p.id = w.platform_id WHERE w.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(title)
    }

    async fn create_title(&self, title: NewTitle) -> AppResult<TitleRow> {
        let platform_id = title.platform_id;
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "WITH w AS ( \
                INSERT INTO watchlist (title, storyline, active, platform_id) \
                VALUES ($1, $2, $3, $4) RETURNING * \
             ) \
             SELECT {TITLE_COLUMNS} FROM w JOIN stream_platforms p ON p.id = w.platform_id"
        ))
        .bind(title.title)
        .bind(title.storyline)
        .bind(title.active)
        .bind(title.platform_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_platform_fk(platform_id))?;

        Ok(row)
    }

    async fn update_title(&self, id: i64, title: NewTitle) -> AppResult<Option<TitleRow>> {
        let platform_id = title.platform_id;
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "WITH w AS ( \
                UPDATE watchlist SET title = $1, storyline = $2, active = $3, platform_id = $4 \
                WHERE id = $5 RETURNING * \
             ) \
             SELECT {TITLE_COLUMNS} FROM w JOIN stream_platforms p ON p.id = w.platform_id"
        ))
        .bind(title.title)
        .bind(title.storyline)
        .bind(title.active)
        .bind(title.platform_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_platform_fk(platform_id))?;

        Ok(row)
    }

    async fn delete_title(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        window: Window,
    ) -> AppResult<Slice<ReviewRow>> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM reviews WHERE {REVIEW_FILTER}"
        ))
        .bind(filter.watchlist_id)
        .bind(filter.username.as_deref())
        .bind(filter.active)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE {REVIEW_FILTER} \
             ORDER BY id LIMIT $4 OFFSET $5"
        ))
        .bind(filter.watchlist_id)
        .bind(filter.username.as_deref())
        .bind(filter.active)
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(Slice { items, total })
    }

    async fn get_review(&self, id: i64) -> AppResult<Option<ReviewRow>> {
        let review = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn create_review(
        &self,
        watchlist_id: i64,
        author: &AuthUser,
        review: NewReview,
    ) -> AppResult<ReviewRow> {
        let mut tx = self.pool.begin().await?;

        // row lock serializes concurrent reviews of the same title
        let (average, count) = sqlx::query_as::<_, (f64, i32)>(
            "SELECT average_rating, rating_count FROM watchlist WHERE id = $1 FOR UPDATE",
        )
        .bind(watchlist_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Title {} not found", watchlist_id)))?;

        let already_reviewed = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE watchlist_id = $1 AND review_user_id = $2)",
        )
        .bind(watchlist_id)
        .bind(author.id)
        .fetch_one(&mut *tx)
        .await?;

        if already_reviewed {
            return Err(AppError::DuplicateReview);
        }

        let stats = RatingStats { average, count }.record(review.rating);

        sqlx::query("UPDATE watchlist SET average_rating = $1, rating_count = $2 WHERE id = $3")
            .bind(stats.average)
            .bind(stats.count)
            .bind(watchlist_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "INSERT INTO reviews (rating, description, active, review_user_id, review_user, watchlist_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(review.rating)
        .bind(review.description)
        .bind(review.active)
        .bind(author.id)
        .bind(&author.username)
        .bind(watchlist_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_review_conflict)?;

        tx.commit().await?;

        tracing::debug!(
            watchlist_id,
            average_rating = stats.average,
            rating_count = stats.count,
            "Title rating updated"
        );

        Ok(row)
    }

    async fn update_review(&self, id: i64, review: NewReview) -> AppResult<Option<ReviewRow>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "UPDATE reviews SET rating = $1, description = $2, active = $3, updated = NOW() \
             WHERE id = $4 RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(review.rating)
        .bind(review.description)
        .bind(review.active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_review(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
