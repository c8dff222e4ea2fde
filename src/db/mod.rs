//! Persistence for platforms, titles and reviews.
//!
//! Handlers only see the [`Repository`] trait. `postgres` is the production
//! store; `memory` keeps everything behind one lock and backs local runs
//! and the integration tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::{create_pool, PgRepository};

use crate::{
    auth::AuthUser,
    error::AppResult,
    models::{NewPlatform, NewReview, NewTitle, PlatformRow, ReviewFilter, ReviewRow, TitleRow},
    pagination::{Slice, Window},
};

/// Message used when a title payload references an unknown platform
pub(crate) fn missing_platform_message(platform_id: i64) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", platform_id)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    async fn list_platforms(&self, window: Window) -> AppResult<Slice<PlatformRow>>;

    /// Every title belonging to any of the given platforms, ordered by id
    async fn titles_for_platforms(&self, platform_ids: &[i64]) -> AppResult<Vec<TitleRow>>;

    async fn get_platform(&self, id: i64) -> AppResult<Option<PlatformRow>>;

    async fn create_platform(&self, platform: NewPlatform) -> AppResult<PlatformRow>;

    async fn update_platform(&self, id: i64, platform: NewPlatform)
        -> AppResult<Option<PlatformRow>>;

    /// Removes the platform with its titles and their reviews
    async fn delete_platform(&self, id: i64) -> AppResult<bool>;

    async fn list_titles(&self, window: Window) -> AppResult<Slice<TitleRow>>;

    async fn get_title(&self, id: i64) -> AppResult<Option<TitleRow>>;

    /// Fails with a `platform` validation error when the platform is unknown
    async fn create_title(&self, title: NewTitle) -> AppResult<TitleRow>;

    async fn update_title(&self, id: i64, title: NewTitle) -> AppResult<Option<TitleRow>>;

    /// Removes the title with its reviews
    async fn delete_title(&self, id: i64) -> AppResult<bool>;

    async fn list_reviews(&self, filter: &ReviewFilter, window: Window)
        -> AppResult<Slice<ReviewRow>>;

    async fn get_review(&self, id: i64) -> AppResult<Option<ReviewRow>>;

    /// Inserts the review and folds its rating into the title, atomically.
    ///
    /// Fails with `NotFound` for an unknown title and `DuplicateReview` when
    /// the author already reviewed it; the title is untouched in both cases.
    async fn create_review(
        &self,
        watchlist_id: i64,
        author: &AuthUser,
        review: NewReview,
    ) -> AppResult<ReviewRow>;

    async fn update_review(&self, id: i64, review: NewReview) -> AppResult<Option<ReviewRow>>;

    async fn delete_review(&self, id: i64) -> AppResult<bool>;
}
