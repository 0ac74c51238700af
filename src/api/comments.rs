use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{self, Identity};
use super::{ApiError, ApiResponse, AppState, CommentDto, Page, PageQuery, ValidJson, validation};

#[derive(Debug, Deserialize)]
pub struct CommentCreateRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentPatchRequest {
    pub text: String,
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<CommentDto>>>, ApiError> {
    require_review(&state, title_id, review_id).await?;

    let (page, page_size) = query.resolve();
    let (items, count, total_pages) = state
        .store()
        .list_comments_for_review(review_id, page, page_size)
        .await?;

    let results = items.into_iter().map(CommentDto::from).collect();
    Ok(Json(ApiResponse::success(Page::new(
        results,
        count,
        total_pages,
    ))))
}

pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id, id)): Path<(i32, i32, i32)>,
) -> Result<Json<ApiResponse<CommentDto>>, ApiError> {
    require_review(&state, title_id, review_id).await?;

    let comment = state
        .store()
        .get_comment(review_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment", id))?;

    Ok(Json(ApiResponse::success(CommentDto::from(comment))))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    ValidJson(payload): ValidJson<CommentCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentDto>>), ApiError> {
    let user = permissions::require_user(&identity)?;
    require_review(&state, title_id, review_id).await?;

    validation::validate_text("text", &payload.text)?;

    let comment = state
        .store()
        .create_comment(review_id, user.id, &payload.text)
        .await?;

    let dto = CommentDto {
        id: comment.id,
        text: comment.text,
        author: user.username.clone(),
        pub_date: comment.pub_date,
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(dto))))
}

pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((title_id, review_id, id)): Path<(i32, i32, i32)>,
    ValidJson(payload): ValidJson<CommentPatchRequest>,
) -> Result<Json<ApiResponse<CommentDto>>, ApiError> {
    let user = permissions::require_user(&identity)?;
    require_review(&state, title_id, review_id).await?;

    let existing = state
        .store()
        .get_comment(review_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment", id))?;

    permissions::author_or_moderator(user, existing.comment.author_id)?;

    validation::validate_text("text", &payload.text)?;

    state
        .store()
        .update_comment(id, &payload.text)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment", id))?;

    let updated = state
        .store()
        .get_comment(review_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment", id))?;

    Ok(Json(ApiResponse::success(CommentDto::from(updated))))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((title_id, review_id, id)): Path<(i32, i32, i32)>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let user = permissions::require_user(&identity)?;
    require_review(&state, title_id, review_id).await?;

    let existing = state
        .store()
        .get_comment(review_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment", id))?;

    permissions::author_or_moderator(user, existing.comment.author_id)?;

    state.store().delete_comment(id).await?;

    Ok(Json(ApiResponse::success(true)))
}

/// A comment path is only valid when the review exists under the given title.
async fn require_review(state: &AppState, title_id: i32, review_id: i32) -> Result<(), ApiError> {
    if !state.store().title_exists(title_id).await? {
        return Err(ApiError::not_found("Title", title_id));
    }
    if state.store().get_review(title_id, review_id).await?.is_none() {
        return Err(ApiError::not_found("Review", review_id));
    }
    Ok(())
}
