use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{self, Identity};
use super::{ApiError, ApiResponse, AppState, CategoryDto, Page, PageQuery, ValidJson, validation};
use crate::db::SlugWrite;

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<CategoryDto>>>, ApiError> {
    let (page, page_size) = query.resolve();
    let (items, count, total_pages) = state.store().list_categories(page, page_size).await?;

    let results = items.into_iter().map(CategoryDto::from).collect();
    Ok(Json(ApiResponse::success(Page::new(
        results,
        count,
        total_pages,
    ))))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<CategoryDto>>, ApiError> {
    let category = state
        .store()
        .get_category_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Category", &slug))?;

    Ok(Json(ApiResponse::success(CategoryDto::from(category))))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ValidJson(payload): ValidJson<CategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryDto>>), ApiError> {
    permissions::admin_or_read_only(&Method::POST, &identity)?;
    validation::validate_name(&payload.name)?;
    validation::validate_slug(&payload.slug)?;

    match state
        .store()
        .create_category(&payload.name, &payload.slug)
        .await?
    {
        SlugWrite::Ok(model) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(CategoryDto::from(model))),
        )),
        SlugWrite::SlugTaken => Err(ApiError::field("slug", "This slug is already in use")),
        SlugWrite::NotFound => Err(ApiError::internal("Unreachable create outcome")),
    }
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
    ValidJson(payload): ValidJson<CategoryPatch>,
) -> Result<Json<ApiResponse<CategoryDto>>, ApiError> {
    permissions::admin_or_read_only(&Method::PATCH, &identity)?;
    if let Some(name) = &payload.name {
        validation::validate_name(name)?;
    }
    if let Some(new_slug) = &payload.slug {
        validation::validate_slug(new_slug)?;
    }

    match state
        .store()
        .update_category(&slug, payload.name.as_deref(), payload.slug.as_deref())
        .await?
    {
        SlugWrite::Ok(model) => Ok(Json(ApiResponse::success(CategoryDto::from(model)))),
        SlugWrite::NotFound => Err(ApiError::not_found("Category", &slug)),
        SlugWrite::SlugTaken => Err(ApiError::field("slug", "This slug is already in use")),
    }
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    permissions::admin_or_read_only(&Method::DELETE, &identity)?;

    if state.store().delete_category(&slug).await? {
        Ok(Json(ApiResponse::success(true)))
    } else {
        Err(ApiError::not_found("Category", &slug))
    }
}
