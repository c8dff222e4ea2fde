use axum::{extract::State, http::StatusCode, Json};

use crate::{
    api::{
        extract::{IdPath, JsonBody},
        AppState,
    },
    error::{AppError, AppResult},
    models::{TitlePayload, TitleResponse},
    pagination::{ListQuery, Page},
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Title {} not found", id))
}

pub async fn list_titles(
    State(state): State<AppState>,
    query: ListQuery,
) -> AppResult<Json<Page<TitleResponse>>> {
    let window = state.paginator.window(&query)?;
    let slice = state.repo.list_titles(window).await?;

    tracing::debug!(total = slice.total, returned = slice.items.len(), "Listing titles");

    let page = state
        .paginator
        .page(&query, window, slice.map(TitleResponse::from))?;
    Ok(Json(page))
}

pub async fn create_title(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TitlePayload>,
) -> AppResult<(StatusCode, Json<TitleResponse>)> {
    let title = payload.validate()?;
    let row = state.repo.create_title(title).await?;

    tracing::info!(watchlist_id = row.id, platform_id = row.platform_id, "Title created");

    Ok((StatusCode::CREATED, Json(TitleResponse::from(row))))
}

pub async fn get_title(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<TitleResponse>> {
    let row = state.repo.get_title(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(TitleResponse::from(row)))
}

/// Full replacement; rating aggregates are kept as they are
pub async fn update_title(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    JsonBody(payload): JsonBody<TitlePayload>,
) -> AppResult<Json<TitleResponse>> {
    let title = payload.validate()?;
    let row = state
        .repo
        .update_title(id, title)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(watchlist_id = id, "Title updated");

    Ok(Json(TitleResponse::from(row)))
}

pub async fn delete_title(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<StatusCode> {
    if !state.repo.delete_title(id).await? {
        return Err(not_found(id));
    }

    tracing::info!(watchlist_id = id, "Title deleted");
    Ok(StatusCode::NO_CONTENT)
}
