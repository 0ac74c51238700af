use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::is_unique_violation;
use crate::entities::{comments, prelude::*, reviews};

/// A review joined with its author's username for the wire representation.
#[derive(Debug, Clone)]
pub struct ReviewWithAuthor {
    pub review: reviews::Model,
    pub author: String,
}

pub struct ReviewRepository {
    conn: DatabaseConnection,
}

impl ReviewRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_title(
        &self,
        title_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<ReviewWithAuthor>, u64, u64)> {
        let paginator = Reviews::find()
            .filter(reviews::Column::TitleId.eq(title_id))
            .order_by_asc(reviews::Column::PubDate)
            .find_also_related(Users)
            .paginate(&self.conn, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let rows = paginator.fetch_page(page - 1).await?;

        Ok((
            rows.into_iter().map(with_author).collect(),
            totals.number_of_items,
            totals.number_of_pages,
        ))
    }

    /// Lookup scoped to the parent title; a review reached through the wrong
    /// title path does not exist.
    pub async fn get(&self, title_id: i32, id: i32) -> Result<Option<ReviewWithAuthor>> {
        let row = Reviews::find_by_id(id)
            .filter(reviews::Column::TitleId.eq(title_id))
            .find_also_related(Users)
            .one(&self.conn)
            .await
            .context("Failed to query review")?;

        Ok(row.map(with_author))
    }

    pub async fn exists_for(&self, title_id: i32, author_id: i32) -> Result<bool> {
        let found = Reviews::find()
            .filter(reviews::Column::TitleId.eq(title_id))
            .filter(reviews::Column::AuthorId.eq(author_id))
            .one(&self.conn)
            .await?;

        Ok(found.is_some())
    }

    /// Inserts a review; `None` means the (title, author) pair already has
    /// one. The unique index catches submissions that race the
    /// [`Self::exists_for`] pre-check.
    pub async fn create(
        &self,
        title_id: i32,
        author_id: i32,
        text: &str,
        score: i16,
    ) -> Result<Option<reviews::Model>> {
        let active = reviews::ActiveModel {
            title_id: Set(title_id),
            author_id: Set(author_id),
            text: Set(text.to_string()),
            score: Set(score),
            pub_date: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(Some(model)),
            Err(e) if is_unique_violation(&e, "reviews.title_id") => Ok(None),
            Err(e) => Err(e).context("Failed to insert review"),
        }
    }

    pub async fn update(
        &self,
        id: i32,
        text: Option<&str>,
        score: Option<i16>,
    ) -> Result<Option<reviews::Model>> {
        let Some(review) = Reviews::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: reviews::ActiveModel = review.into();
        if let Some(text) = text {
            active.text = Set(text.to_string());
        }
        if let Some(score) = score {
            active.score = Set(score);
        }

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update review")?;

        Ok(Some(updated))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let Some(review) = Reviews::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        Comments::delete_many()
            .filter(comments::Column::ReviewId.eq(review.id))
            .exec(&self.conn)
            .await?;

        reviews::Entity::delete_by_id(review.id)
            .exec(&self.conn)
            .await?;

        Ok(true)
    }
}

fn with_author(
    (review, user): (reviews::Model, Option<crate::entities::users::Model>),
) -> ReviewWithAuthor {
    let author = user.map_or_else(String::new, |u| u.username);
    ReviewWithAuthor { review, author }
}
