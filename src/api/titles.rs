use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{self, Identity};
use super::{ApiError, ApiResponse, AppState, Page, TitleDto, resolve_page, ValidJson, validation};
use crate::db::{TitleChanges, TitleFilter};

/// List filters plus pagination, all optional.
#[derive(Debug, Default, Deserialize)]
pub struct TitleListQuery {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TitleCreateRequest {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    /// Category slug; required on create.
    pub category: String,
    /// Genre slugs; defaults to no genres.
    #[serde(default)]
    pub genre: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitlePatchRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Option<Vec<String>>,
}

pub async fn list_titles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TitleListQuery>,
) -> Result<Json<ApiResponse<Page<TitleDto>>>, ApiError> {
    let (page, page_size) = resolve_page(query.page, query.page_size);
    let filter = TitleFilter {
        category_slug: query.category,
        genre_slug: query.genre,
        name: query.name,
        year: query.year,
    };

    let (items, count, total_pages) = state.store().list_titles(&filter, page, page_size).await?;

    let results = items.into_iter().map(TitleDto::from).collect();
    Ok(Json(ApiResponse::success(Page::new(
        results,
        count,
        total_pages,
    ))))
}

pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<TitleDto>>, ApiError> {
    let title = state
        .store()
        .get_title(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Title", id))?;

    Ok(Json(ApiResponse::success(TitleDto::from(title))))
}

pub async fn create_title(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ValidJson(payload): ValidJson<TitleCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TitleDto>>), ApiError> {
    permissions::admin_or_read_only(&Method::POST, &identity)?;
    validation::validate_name(&payload.name)?;
    validation::validate_year(payload.year)?;

    let category = state
        .store()
        .get_category_by_slug(&payload.category)
        .await?
        .ok_or_else(|| {
            ApiError::field(
                "category",
                format!("Category with slug \"{}\" does not exist", payload.category),
            )
        })?;

    let genre_ids = resolve_genres(&state, &payload.genre).await?;

    let title = state
        .store()
        .create_title(
            &payload.name,
            payload.year,
            payload.description.as_deref(),
            category.id,
            &genre_ids,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TitleDto::from(title))),
    ))
}

pub async fn update_title(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
    ValidJson(payload): ValidJson<TitlePatchRequest>,
) -> Result<Json<ApiResponse<TitleDto>>, ApiError> {
    permissions::admin_or_read_only(&Method::PATCH, &identity)?;

    if let Some(name) = &payload.name {
        validation::validate_name(name)?;
    }
    if let Some(year) = payload.year {
        validation::validate_year(year)?;
    }

    let category_id = match &payload.category {
        None => None,
        Some(slug) => {
            let category = state
                .store()
                .get_category_by_slug(slug)
                .await?
                .ok_or_else(|| {
                    ApiError::field(
                        "category",
                        format!("Category with slug \"{slug}\" does not exist"),
                    )
                })?;
            Some(Some(category.id))
        }
    };

    let genre_ids = match &payload.genre {
        None => None,
        Some(slugs) => Some(resolve_genres(&state, slugs).await?),
    };

    let changes = TitleChanges {
        name: payload.name,
        year: payload.year,
        description: payload.description,
        category_id,
        genre_ids,
    };

    let title = state
        .store()
        .update_title(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Title", id))?;

    Ok(Json(ApiResponse::success(TitleDto::from(title))))
}

pub async fn delete_title(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    permissions::admin_or_read_only(&Method::DELETE, &identity)?;

    if state.store().delete_title(id).await? {
        Ok(Json(ApiResponse::success(true)))
    } else {
        Err(ApiError::not_found("Title", id))
    }
}

async fn resolve_genres(state: &AppState, slugs: &[String]) -> Result<Vec<i32>, ApiError> {
    match state.store().resolve_genre_slugs(slugs).await? {
        Ok(ids) => Ok(ids),
        Err(unknown) => Err(ApiError::field(
            "genre",
            format!("Genre with slug \"{unknown}\" does not exist"),
        )),
    }
}
