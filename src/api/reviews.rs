use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{self, Identity};
use super::{ApiError, ApiResponse, AppState, Page, PageQuery, ReviewDto, ValidJson, validation};

#[derive(Debug, Deserialize)]
pub struct ReviewCreateRequest {
    pub text: String,
    pub score: i16,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPatchRequest {
    pub text: Option<String>,
    pub score: Option<i16>,
}

pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(title_id): Path<i32>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<ReviewDto>>>, ApiError> {
    require_title(&state, title_id).await?;

    let (page, page_size) = query.resolve();
    let (items, count, total_pages) = state
        .store()
        .list_reviews_for_title(title_id, page, page_size)
        .await?;

    let results = items.into_iter().map(ReviewDto::from).collect();
    Ok(Json(ApiResponse::success(Page::new(
        results,
        count,
        total_pages,
    ))))
}

pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path((title_id, id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse<ReviewDto>>, ApiError> {
    require_title(&state, title_id).await?;

    let review = state
        .store()
        .get_review(title_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", id))?;

    Ok(Json(ApiResponse::success(ReviewDto::from(review))))
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(title_id): Path<i32>,
    ValidJson(payload): ValidJson<ReviewCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReviewDto>>), ApiError> {
    let user = permissions::require_user(&identity)?;
    require_title(&state, title_id).await?;

    validation::validate_text("text", &payload.text)?;
    validation::validate_score(payload.score)?;

    // Best-effort pre-check; the unique index on (title_id, author_id) is
    // what actually holds under concurrent submissions.
    if state.store().review_exists_for(title_id, user.id).await? {
        return Err(duplicate_review());
    }

    let review = state
        .store()
        .create_review(title_id, user.id, &payload.text, payload.score)
        .await?
        .ok_or_else(duplicate_review)?;

    let dto = ReviewDto {
        id: review.id,
        text: review.text,
        author: user.username.clone(),
        score: review.score,
        pub_date: review.pub_date,
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(dto))))
}

pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((title_id, id)): Path<(i32, i32)>,
    ValidJson(payload): ValidJson<ReviewPatchRequest>,
) -> Result<Json<ApiResponse<ReviewDto>>, ApiError> {
    let user = permissions::require_user(&identity)?;
    require_title(&state, title_id).await?;

    let existing = state
        .store()
        .get_review(title_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", id))?;

    permissions::author_or_moderator(user, existing.review.author_id)?;

    if let Some(text) = &payload.text {
        validation::validate_text("text", text)?;
    }
    if let Some(score) = payload.score {
        validation::validate_score(score)?;
    }

    state
        .store()
        .update_review(id, payload.text.as_deref(), payload.score)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", id))?;

    let updated = state
        .store()
        .get_review(title_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", id))?;

    Ok(Json(ApiResponse::success(ReviewDto::from(updated))))
}

pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((title_id, id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let user = permissions::require_user(&identity)?;
    require_title(&state, title_id).await?;

    let existing = state
        .store()
        .get_review(title_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Review", id))?;

    permissions::author_or_moderator(user, existing.review.author_id)?;

    state.store().delete_review(id).await?;

    Ok(Json(ApiResponse::success(true)))
}

fn duplicate_review() -> ApiError {
    ApiError::field("title", "You have already reviewed this title")
}

async fn require_title(state: &AppState, title_id: i32) -> Result<(), ApiError> {
    if state.store().title_exists(title_id).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("Title", title_id))
    }
}
