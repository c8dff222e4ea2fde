use crate::{
    auth::AuthUser,
    db::Repository,
    error::AppResult,
    models::{ReviewPayload, ReviewRow},
};

/// Validates a submitted review and records it against the title.
/// Nothing reaches the repository unless the payload is valid.
pub async fn submit_review(
    repo: &dyn Repository,
    watchlist_id: i64,
    author: &AuthUser,
    payload: ReviewPayload,
) -> AppResult<ReviewRow> {
    let review = payload.validate()?;

    tracing::info!(
        watchlist_id,
        user_id = author.id,
        rating = review.rating,
        "Creating review"
    );

    let row = repo.create_review(watchlist_id, author, review).await?;

    tracing::info!(review_id = row.id, watchlist_id, "Review created");

    Ok(row)
}
