use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::{comments, prelude::*};

#[derive(Debug, Clone)]
pub struct CommentWithAuthor {
    pub comment: comments::Model,
    pub author: String,
}

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_review(
        &self,
        review_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<CommentWithAuthor>, u64, u64)> {
        let paginator = Comments::find()
            .filter(comments::Column::ReviewId.eq(review_id))
            .order_by_asc(comments::Column::PubDate)
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

    pub async fn get(&self, review_id: i32, id: i32) -> Result<Option<CommentWithAuthor>> {
        let row = Comments::find_by_id(id)
            .filter(comments::Column::ReviewId.eq(review_id))
            .find_also_related(Users)
            .one(&self.conn)
            .await
            .context("Failed to query comment")?;

        Ok(row.map(with_author))
    }

    pub async fn create(
        &self,
        review_id: i32,
        author_id: i32,
        text: &str,
    ) -> Result<comments::Model> {
        let active = comments::ActiveModel {
            review_id: Set(review_id),
            author_id: Set(author_id),
            text: Set(text.to_string()),
            pub_date: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert comment")
    }

    pub async fn update(&self, id: i32, text: &str) -> Result<Option<comments::Model>> {
        let Some(comment) = Comments::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: comments::ActiveModel = comment.into();
        active.text = Set(text.to_string());

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update comment")?;

        Ok(Some(updated))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = comments::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}

fn with_author(
    (comment, user): (comments::Model, Option<crate::entities::users::Model>),
) -> CommentWithAuthor {
    let author = user.map_or_else(String::new, |u| u.username);
    CommentWithAuthor { comment, author }
}
