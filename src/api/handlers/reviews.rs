use axum::{
    extract::State,
    http::{Method, StatusCode},
    Extension, Json,
};

use crate::{
    api::{
        extract::{IdPath, JsonBody},
        AppState,
    },
    auth::Identity,
    error::{AppError, AppResult},
    models::{ReviewFilter, ReviewPayload, ReviewResponse, ReviewRow},
    pagination::{ListQuery, Page},
    policy::permissions::check_owner,
    services::reviews::submit_review,
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Review {} not found", id))
}

/// Loads a review and applies the owner-or-read-only rule for `method`
async fn load_for(
    state: &AppState,
    identity: &Identity,
    method: &Method,
    id: i64,
) -> AppResult<ReviewRow> {
    let review = state.repo.get_review(id).await?.ok_or_else(|| not_found(id))?;

    if let Err(denied) = check_owner(identity, method, review.review_user_id) {
        tracing::warn!(review_id = id, method = %method, "Review owner check failed");
        return Err(denied);
    }

    Ok(review)
}

async fn list_page(
    state: &AppState,
    query: &ListQuery,
    filter: &ReviewFilter,
) -> AppResult<Page<ReviewResponse>> {
    let window = state.paginator.window(query)?;
    let slice = state.repo.list_reviews(filter, window).await?;
    state
        .paginator
        .page(query, window, slice.map(ReviewResponse::from))
}

/// Create a review of title `{id}` as the calling user
pub async fn create_review(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    IdPath(watchlist_id): IdPath,
    JsonBody(payload): JsonBody<ReviewPayload>,
) -> AppResult<(StatusCode, Json<ReviewResponse>)> {
    let author = identity.require_user()?;
    let row = submit_review(state.repo.as_ref(), watchlist_id, author, payload).await?;
    Ok((StatusCode::CREATED, Json(ReviewResponse::from(row))))
}

/// Reviews of title `{id}`, filterable by `review_user__username` and `active`
pub async fn list_reviews(
    State(state): State<AppState>,
    IdPath(watchlist_id): IdPath,
    query: ListQuery,
) -> AppResult<Json<Page<ReviewResponse>>> {
    let filter = ReviewFilter::for_title(watchlist_id, &query)?;
    tracing::debug!(?filter, "Listing reviews");
    Ok(Json(list_page(&state, &query, &filter).await?))
}

/// Reviews written by `?username=`; no username means no reviews
pub async fn user_reviews(
    State(state): State<AppState>,
    query: ListQuery,
) -> AppResult<Json<Page<ReviewResponse>>> {
    let Some(username) = query.get("username") else {
        return Ok(Json(Page::empty()));
    };

    let filter = ReviewFilter::by_username(username);
    Ok(Json(list_page(&state, &query, &filter).await?))
}

pub async fn get_review(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    IdPath(id): IdPath,
) -> AppResult<Json<ReviewResponse>> {
    let review = load_for(&state, &identity, &method, id).await?;
    Ok(Json(ReviewResponse::from(review)))
}

/// Owner-only replacement; the title's rating aggregates are not recomputed
pub async fn update_review(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    IdPath(id): IdPath,
    JsonBody(payload): JsonBody<ReviewPayload>,
) -> AppResult<Json<ReviewResponse>> {
    load_for(&state, &identity, &method, id).await?;

    let review = payload.validate()?;
    let row = state
        .repo
        .update_review(id, review)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(review_id = id, "Review updated");

    Ok(Json(ReviewResponse::from(row)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    IdPath(id): IdPath,
) -> AppResult<StatusCode> {
    load_for(&state, &identity, &method, id).await?;

    if !state.repo.delete_review(id).await? {
        return Err(not_found(id));
    }

    tracing::info!(review_id = id, "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}
