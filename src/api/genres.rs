use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{self, Identity};
use super::{ApiError, ApiResponse, AppState, GenreDto, Page, PageQuery, ValidJson, validation};
use crate::db::GenreWrite;

#[derive(Debug, Deserialize)]
pub struct GenreRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct GenrePatch {
    pub name: Option<String>,
    pub slug: Option<String>,
}

pub async fn list_genres(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<GenreDto>>>, ApiError> {
    let (page, page_size) = query.resolve();
    let (items, count, total_pages) = state.store().list_genres(page, page_size).await?;

    let results = items.into_iter().map(GenreDto::from).collect();
    Ok(Json(ApiResponse::success(Page::new(
        results,
        count,
        total_pages,
    ))))
}

pub async fn get_genre(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<GenreDto>>, ApiError> {
    let genre = state
        .store()
        .get_genre_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Genre", &slug))?;

    Ok(Json(ApiResponse::success(GenreDto::from(genre))))
}

pub async fn create_genre(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ValidJson(payload): ValidJson<GenreRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GenreDto>>), ApiError> {
    permissions::admin_or_read_only(&Method::POST, &identity)?;
    validation::validate_name(&payload.name)?;
    validation::validate_slug(&payload.slug)?;

    match state
        .store()
        .create_genre(&payload.name, &payload.slug)
        .await?
    {
        GenreWrite::Ok(model) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(GenreDto::from(model))),
        )),
        GenreWrite::SlugTaken => Err(ApiError::field("slug", "This slug is already in use")),
        GenreWrite::NotFound => Err(ApiError::internal("Unreachable create outcome")),
    }
}

pub async fn update_genre(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
    ValidJson(payload): ValidJson<GenrePatch>,
) -> Result<Json<ApiResponse<GenreDto>>, ApiError> {
    permissions::admin_or_read_only(&Method::PATCH, &identity)?;
    if let Some(name) = &payload.name {
        validation::validate_name(name)?;
    }
    if let Some(new_slug) = &payload.slug {
        validation::validate_slug(new_slug)?;
    }

    match state
        .store()
        .update_genre(&slug, payload.name.as_deref(), payload.slug.as_deref())
        .await?
    {
        GenreWrite::Ok(model) => Ok(Json(ApiResponse::success(GenreDto::from(model)))),
        GenreWrite::NotFound => Err(ApiError::not_found("Genre", &slug)),
        GenreWrite::SlugTaken => Err(ApiError::field("slug", "This slug is already in use")),
    }
}

pub async fn delete_genre(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    permissions::admin_or_read_only(&Method::DELETE, &identity)?;

    if state.store().delete_genre(&slug).await? {
        Ok(Json(ApiResponse::success(true)))
    } else {
        Err(ApiError::not_found("Genre", &slug))
    }
}
