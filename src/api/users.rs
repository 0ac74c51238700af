use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{self, Identity};
use super::{ApiError, ApiResponse, AppState, Page, PageQuery, UserDto, ValidJson, validation};
use crate::db::{UserChanges, UserWrite};
use crate::domain::Role;

#[derive(Debug, Deserialize)]
pub struct UserCreateRequest {
    pub username: String,
    pub email: String,
    pub role: Option<String>,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserPatchRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserPatchRequest {
    /// Validates provided fields and converts to repository changes.
    /// Role handling differs per endpoint, so it stays with the caller.
    fn into_changes(self) -> Result<(UserChanges, Option<Role>), ApiError> {
        if let Some(username) = &self.username {
            validation::validate_username(username)?;
        }
        if let Some(email) = &self.email {
            validation::validate_email(email)?;
        }

        let role = self.role.as_deref().map(parse_role).transpose()?;

        Ok((
            UserChanges {
                username: self.username,
                email: self.email,
                role: None,
                bio: self.bio,
                first_name: self.first_name,
                last_name: self.last_name,
            },
            role,
        ))
    }
}

/// GET /users/ (admin)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<UserDto>>>, ApiError> {
    permissions::admin_only(&identity)?;

    let (page, page_size) = query.resolve();
    let (items, count, total_pages) = state.store().list_users(page, page_size).await?;

    let results = items.into_iter().map(UserDto::from).collect();
    Ok(Json(ApiResponse::success(Page::new(
        results,
        count,
        total_pages,
    ))))
}

/// POST /users/ (admin)
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ValidJson(payload): ValidJson<UserCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    permissions::admin_only(&identity)?;

    validation::validate_username(&payload.username)?;
    validation::validate_email(&payload.email)?;
    let role = payload
        .role
        .as_deref()
        .map_or(Ok(Role::User), parse_role)?;

    let changes = UserChanges {
        bio: payload.bio,
        first_name: payload.first_name,
        last_name: payload.last_name,
        ..Default::default()
    };

    match state
        .store()
        .create_user(&payload.username, &payload.email, role, &changes)
        .await?
    {
        UserWrite::Ok(user) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(UserDto::from(user))),
        )),
        UserWrite::UsernameTaken => {
            Err(ApiError::field("username", "This username is already in use"))
        }
        UserWrite::EmailTaken => Err(ApiError::field("email", "This email is already in use")),
        UserWrite::NotFound => Err(ApiError::internal("Unreachable create outcome")),
    }
}

/// GET /users/me/
pub async fn me(
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = permissions::require_user(&identity)?;
    Ok(Json(ApiResponse::success(UserDto::from(user.clone()))))
}

/// PATCH /users/me/
/// A submitted `role` is silently discarded: the stored role always survives
/// a self-edit, whatever the requester claims to be.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ValidJson(payload): ValidJson<UserPatchRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = permissions::require_user(&identity)?;

    let (changes, _submitted_role) = payload.into_changes()?;

    match state.store().update_user(&user.username, &changes).await? {
        UserWrite::Ok(updated) => Ok(Json(ApiResponse::success(UserDto::from(updated)))),
        UserWrite::NotFound => Err(ApiError::not_found("User", &user.username)),
        UserWrite::UsernameTaken => {
            Err(ApiError::field("username", "This username is already in use"))
        }
        UserWrite::EmailTaken => Err(ApiError::field("email", "This email is already in use")),
    }
}

/// GET /users/{username}/ (admin)
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    permissions::admin_only(&identity)?;

    let user = state
        .store()
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &username))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PATCH /users/{username}/ (admin; may change roles)
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(username): Path<String>,
    ValidJson(payload): ValidJson<UserPatchRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    permissions::admin_only(&identity)?;

    let (mut changes, submitted_role) = payload.into_changes()?;
    changes.role = submitted_role;

    match state.store().update_user(&username, &changes).await? {
        UserWrite::Ok(updated) => Ok(Json(ApiResponse::success(UserDto::from(updated)))),
        UserWrite::NotFound => Err(ApiError::not_found("User", &username)),
        UserWrite::UsernameTaken => {
            Err(ApiError::field("username", "This username is already in use"))
        }
        UserWrite::EmailTaken => Err(ApiError::field("email", "This email is already in use")),
    }
}

/// DELETE /users/{username}/ (admin)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    permissions::admin_only(&identity)?;

    if state.store().delete_user(&username).await? {
        Ok(Json(ApiResponse::success(true)))
    } else {
        Err(ApiError::not_found("User", &username))
    }
}

fn parse_role(value: &str) -> Result<Role, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::field("role", "Role must be one of: user, moderator, admin"))
}
