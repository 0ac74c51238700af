//! The three authorization predicates, evaluated in the handlers against the
//! identity resolved by the bearer-token middleware.

use axum::http::Method;

use super::ApiError;
use crate::db::User;

/// Who is making the request. Inserted into request extensions by
/// [`super::auth::identify`].
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Known(User),
}

impl Identity {
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Known(user) => Some(user),
        }
    }
}

fn is_read_only(method: &Method) -> bool {
    matches!(method.as_str(), "GET" | "HEAD" | "OPTIONS")
}

fn administers(user: &User) -> bool {
    user.role.can_administer() || user.is_elevated()
}

/// Rejects anonymous requests; everything behind a review/comment mutation
/// starts here.
pub fn require_user(identity: &Identity) -> Result<&User, ApiError> {
    identity
        .user()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// Reads pass unconditionally; mutation needs an admin (or the
/// staff/superuser bypass). Categories, genres and titles.
pub fn admin_or_read_only(method: &Method, identity: &Identity) -> Result<(), ApiError> {
    if is_read_only(method) {
        return Ok(());
    }

    let user = require_user(identity)?;
    if administers(user) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator access required"))
    }
}

/// User-management endpoints.
pub fn admin_only(identity: &Identity) -> Result<&User, ApiError> {
    let user = require_user(identity)?;
    if administers(user) {
        Ok(user)
    } else {
        Err(ApiError::forbidden("Administrator access required"))
    }
}

/// Object-level check for mutating a review or comment: its author, anyone
/// who can moderate, or an elevated account.
pub fn author_or_moderator(user: &User, author_id: i32) -> Result<(), ApiError> {
    if user.id == author_id || user.role.can_moderate() || user.is_elevated() {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only the author or a moderator may modify this",
        ))
    }
}
