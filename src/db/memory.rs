use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{missing_platform_message, Repository};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{NewPlatform, NewReview, NewTitle, PlatformRow, ReviewFilter, ReviewRow, TitleRow},
    pagination::{Slice, Window},
    services::ratings::RatingStats,
};

/// Repository kept entirely in process memory
///
/// Every write takes the single write lock, which makes review creation
/// atomic with respect to other writers.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Tables>,
}

/// Per-table id counter; ids are never reused after a delete
#[derive(Default)]
struct Sequence(i64);

impl Sequence {
    fn next(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

#[derive(Default)]
struct Tables {
    platform_ids: Sequence,
    title_ids: Sequence,
    review_ids: Sequence,
    platforms: BTreeMap<i64, PlatformRow>,
    titles: BTreeMap<i64, TitleRow>,
    reviews: BTreeMap<i64, ReviewRow>,
}

impl Tables {
    /// Title with the current name of its platform filled in
    fn hydrate(&self, title: &TitleRow) -> TitleRow {
        let mut title = title.clone();
        if let Some(platform) = self.platforms.get(&title.platform_id) {
            title.platform_name = platform.name.clone();
        }
        title
    }

    fn platform_name(&self, platform_id: i64) -> AppResult<String> {
        self.platforms
            .get(&platform_id)
            .map(|platform| platform.name.clone())
            .ok_or_else(|| AppError::invalid("platform", missing_platform_message(platform_id)))
    }

    fn remove_title(&mut self, id: i64) -> bool {
        let removed = self.titles.remove(&id).is_some();
        if removed {
            self.reviews.retain(|_, review| review.watchlist_id != id);
        }
        removed
    }
}

fn window_of<T>(items: impl Iterator<Item = T>, window: Window) -> Vec<T> {
    items
        .skip(window.offset.max(0) as usize)
        .take(window.limit.max(0) as usize)
        .collect()
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_platforms(&self, window: Window) -> AppResult<Slice<PlatformRow>> {
        let tables = self.inner.read().await;
        Ok(Slice {
            items: window_of(tables.platforms.values().cloned(), window),
            total: tables.platforms.len() as i64,
        })
    }

    async fn titles_for_platforms(&self, platform_ids: &[i64]) -> AppResult<Vec<TitleRow>> {
        let tables = self.inner.read().await;
        Ok(tables
            .titles
            .values()
            .filter(|title| platform_ids.contains(&title.platform_id))
            .map(|title| tables.hydrate(title))
            .collect())
    }

    async fn get_platform(&self, id: i64) -> AppResult<Option<PlatformRow>> {
        Ok(self.inner.read().await.platforms.get(&id).cloned())
    }

    async fn create_platform(&self, platform: NewPlatform) -> AppResult<PlatformRow> {
        let mut tables = self.inner.write().await;
        let row = PlatformRow {
            id: tables.platform_ids.next(),
            name: platform.name,
            about: platform.about,
            website: platform.website,
        };
        tables.platforms.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_platform(
        &self,
        id: i64,
        platform: NewPlatform,
    ) -> AppResult<Option<PlatformRow>> {
        let mut tables = self.inner.write().await;
        Ok(tables.platforms.get_mut(&id).map(|row| {
            row.name = platform.name;
            row.about = platform.about;
            row.website = platform.website;
            row.clone()
        }))
    }

    async fn delete_platform(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.inner.write().await;
        if tables.platforms.remove(&id).is_none() {
            return Ok(false);
        }

        let orphaned: Vec<i64> = tables
            .titles
            .values()
            .filter(|title| title.platform_id == id)
            .map(|title| title.id)
            .collect();
        for title_id in orphaned {
            tables.remove_title(title_id);
        }

        Ok(true)
    }

    async fn list_titles(&self, window: Window) -> AppResult<Slice<TitleRow>> {
        let tables = self.inner.read().await;
        Ok(Slice {
            items: window_of(tables.titles.values().map(|t| tables.hydrate(t)), window),
            total: tables.titles.len() as i64,
        })
    }

    async fn get_title(&self, id: i64) -> AppResult<Option<TitleRow>> {
        let tables = self.inner.read().await;
        Ok(tables.titles.get(&id).map(|title| tables.hydrate(title)))
    }

    async fn create_title(&self, title: NewTitle) -> AppResult<TitleRow> {
        let mut tables = self.inner.write().await;
        let platform_name = tables.platform_name(title.platform_id)?;

        let row = TitleRow {
            id: tables.title_ids.next(),
            title: title.title,
            storyline: title.storyline,
            active: title.active,
            average_rating: RatingStats::EMPTY.average,
            rating_count: RatingStats::EMPTY.count,
            platform_id: title.platform_id,
            platform_name,
            created: Utc::now(),
        };
        tables.titles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_title(&self, id: i64, title: NewTitle) -> AppResult<Option<TitleRow>> {
        let mut tables = self.inner.write().await;
        if !tables.titles.contains_key(&id) {
            return Ok(None);
        }
        let platform_name = tables.platform_name(title.platform_id)?;

        Ok(tables.titles.get_mut(&id).map(|row| {
            row.title = title.title;
            row.storyline = title.storyline;
            row.active = title.active;
            row.platform_id = title.platform_id;
            row.platform_name = platform_name;
            row.clone()
        }))
    }

    async fn delete_title(&self, id: i64) -> AppResult<bool> {
        Ok(self.inner.write().await.remove_title(id))
    }

    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        window: Window,
    ) -> AppResult<Slice<ReviewRow>> {
        let tables = self.inner.read().await;
        let total = tables.reviews.values().filter(|r| filter.matches(r)).count();
        let items = window_of(
            tables.reviews.values().filter(|r| filter.matches(r)).cloned(),
            window,
        );
        Ok(Slice {
            items,
            total: total as i64,
        })
    }

    async fn get_review(&self, id: i64) -> AppResult<Option<ReviewRow>> {
        Ok(self.inner.read().await.reviews.get(&id).cloned())
    }

    async fn create_review(
        &self,
        watchlist_id: i64,
        author: &AuthUser,
        review: NewReview,
    ) -> AppResult<ReviewRow> {
        let mut tables = self.inner.write().await;

        let title = tables
            .titles
            .get(&watchlist_id)
            .ok_or_else(|| AppError::NotFound(format!("Title {} not found", watchlist_id)))?;
        let current = RatingStats {
            average: title.average_rating,
            count: title.rating_count,
        };

        let already_reviewed = tables
            .reviews
            .values()
            .any(|r| r.watchlist_id == watchlist_id && r.review_user_id == author.id);
        if already_reviewed {
            return Err(AppError::DuplicateReview);
        }

        let stats = current.record(review.rating);
        let now = Utc::now();
        let row = ReviewRow {
            id: tables.review_ids.next(),
            rating: review.rating,
            description: review.description,
            active: review.active,
            review_user_id: author.id,
            review_user: author.username.clone(),
            watchlist_id,
            created: now,
            updated: now,
        };

        if let Some(title) = tables.titles.get_mut(&watchlist_id) {
            title.average_rating = stats.average;
            title.rating_count = stats.count;
        }
        tables.reviews.insert(row.id, row.clone());

        Ok(row)
    }

    async fn update_review(&self, id: i64, review: NewReview) -> AppResult<Option<ReviewRow>> {
        let mut tables = self.inner.write().await;
        Ok(tables.reviews.get_mut(&id).map(|row| {
            row.rating = review.rating;
            row.description = review.description;
            row.active = review.active;
            row.updated = Utc::now();
            row.clone()
        }))
    }

    async fn delete_review(&self, id: i64) -> AppResult<bool> {
        Ok(self.inner.write().await.reviews.remove(&id).is_some())
    }
}
