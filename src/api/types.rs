use axum::extract::{FromRequest, Request};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ApiError;
use super::error::FieldError;
use crate::db::{CommentWithAuthor, ReviewWithAuthor, TitleWithMeta, User};
use crate::entities::{categories, genres};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Field -> messages map, present only on validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            fields: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            fields: None,
        }
    }

    pub fn invalid(message: impl Into<String>, field_errors: &[FieldError]) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for e in field_errors {
            fields
                .entry(e.field.clone())
                .or_default()
                .push(e.message.clone());
        }
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            fields: Some(fields),
        }
    }
}

/// JSON body extractor that reports malformed or mistyped payloads through
/// the regular validation error shape instead of axum's default rejection.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::field("body", rejection.body_text())),
        }
    }
}

/// Page-number pagination input; all list endpoints accept `page` and
/// `page_size` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

impl PageQuery {
    /// Clamped (page, `page_size`), 1-based.
    #[must_use]
    pub fn resolve(&self) -> (u64, u64) {
        resolve_page(self.page, self.page_size)
    }
}

#[must_use]
pub fn resolve_page(page: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub total_pages: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub const fn new(results: Vec<T>, count: u64, total_pages: u64) -> Self {
        Self {
            count,
            total_pages,
            results,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct CategoryDto {
    pub name: String,
    pub slug: String,
}

impl From<categories::Model> for CategoryDto {
    fn from(model: categories::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct GenreDto {
    pub name: String,
    pub slug: String,
}

impl From<genres::Model> for GenreDto {
    fn from(model: genres::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TitleDto {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category: Option<CategoryDto>,
    pub genre: Vec<GenreDto>,
    /// Mean review score, absent until the first review lands.
    pub rating: Option<f64>,
}

impl From<TitleWithMeta> for TitleDto {
    fn from(meta: TitleWithMeta) -> Self {
        Self {
            id: meta.title.id,
            name: meta.title.name,
            year: meta.title.year,
            description: meta.title.description,
            category: meta.category.map(CategoryDto::from),
            genre: meta.genres.into_iter().map(GenreDto::from).collect(),
            rating: meta.rating,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewDto {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub score: i16,
    pub pub_date: String,
}

impl From<ReviewWithAuthor> for ReviewDto {
    fn from(row: ReviewWithAuthor) -> Self {
        Self {
            id: row.review.id,
            text: row.review.text,
            author: row.author,
            score: row.review.score,
            pub_date: row.review.pub_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub pub_date: String,
}

impl From<CommentWithAuthor> for CommentDto {
    fn from(row: CommentWithAuthor) -> Self {
        Self {
            id: row.comment.id,
            text: row.comment.text,
            author: row.author,
            pub_date: row.comment.pub_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub username: String,
    pub email: String,
    pub role: String,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            role: user.role.as_str().to_string(),
            bio: user.bio,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults() {
        assert_eq!(PageQuery::default().resolve(), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn page_clamping() {
        let q = PageQuery {
            page: Some(0),
            page_size: Some(0),
        };
        assert_eq!(q.resolve(), (1, 1));

        let q = PageQuery {
            page: Some(3),
            page_size: Some(10_000),
        };
        assert_eq!(q.resolve(), (3, MAX_PAGE_SIZE));
    }
}
