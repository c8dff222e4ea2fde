use axum::{extract::State, http::StatusCode, Json};

use crate::{
    api::{
        extract::{IdPath, JsonBody},
        AppState,
    },
    error::{AppError, AppResult},
    models::{PlatformPayload, PlatformResponse, PlatformRow},
    pagination::{ListQuery, Page, Slice},
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Platform {} not found", id))
}

/// Expands a single platform with its titles
async fn expand(state: &AppState, platform: PlatformRow) -> AppResult<PlatformResponse> {
    let titles = state.repo.titles_for_platforms(&[platform.id]).await?;
    Ok(PlatformResponse::from_row(platform, titles))
}

/// List platforms, each with its titles embedded
pub async fn list_platforms(
    State(state): State<AppState>,
    query: ListQuery,
) -> AppResult<Json<Page<PlatformResponse>>> {
    let window = state.paginator.window(&query)?;
    let Slice { items, total } = state.repo.list_platforms(window).await?;

    let ids: Vec<i64> = items.iter().map(|platform| platform.id).collect();
    let titles = state.repo.titles_for_platforms(&ids).await?;

    let slice = Slice {
        items: PlatformResponse::from_rows(items, titles),
        total,
    };
    Ok(Json(state.paginator.page(&query, window, slice)?))
}

pub async fn create_platform(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PlatformPayload>,
) -> AppResult<(StatusCode, Json<PlatformResponse>)> {
    let platform = payload.validate()?;
    let row = state.repo.create_platform(platform).await?;

    tracing::info!(platform_id = row.id, name = %row.name, "Platform created");

    Ok((StatusCode::CREATED, Json(PlatformResponse::from_row(row, Vec::new()))))
}

pub async fn get_platform(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<PlatformResponse>> {
    let platform = state.repo.get_platform(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(expand(&state, platform).await?))
}

pub async fn update_platform(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    JsonBody(payload): JsonBody<PlatformPayload>,
) -> AppResult<Json<PlatformResponse>> {
    let platform = payload.validate()?;
    let row = state
        .repo
        .update_platform(id, platform)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(platform_id = id, "Platform updated");

    Ok(Json(expand(&state, row).await?))
}

pub async fn delete_platform(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<StatusCode> {
    if !state.repo.delete_platform(id).await? {
        return Err(not_found(id));
    }

    tracing::info!(platform_id = id, "Platform deleted");
    Ok(StatusCode::NO_CONTENT)
}
