use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::is_unique_violation;
use crate::entities::{categories, prelude::*, titles};

/// Write outcome for slug-keyed resources.
#[derive(Debug)]
pub enum SlugWrite {
    Ok(categories::Model),
    NotFound,
    SlugTaken,
}

pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<categories::Model>, u64, u64)> {
        let paginator = Categories::find()
            .order_by_asc(categories::Column::Slug)
            .paginate(&self.conn, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok((items, totals.number_of_items, totals.number_of_pages))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<categories::Model>> {
        Categories::find()
            .filter(categories::Column::Slug.eq(slug))
            .one(&self.conn)
            .await
            .context("Failed to query category by slug")
    }

    pub async fn create(&self, name: &str, slug: &str) -> Result<SlugWrite> {
        let active = categories::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(SlugWrite::Ok(model)),
            Err(e) if is_unique_violation(&e, "categories.slug") => Ok(SlugWrite::SlugTaken),
            Err(e) => Err(e).context("Failed to insert category"),
        }
    }

    pub async fn update(
        &self,
        slug: &str,
        name: Option<&str>,
        new_slug: Option<&str>,
    ) -> Result<SlugWrite> {
        let Some(category) = self.get_by_slug(slug).await? else {
            return Ok(SlugWrite::NotFound);
        };

        let mut active: categories::ActiveModel = category.into();
        if let Some(name) = name {
            active.name = Set(name.to_string());
        }
        if let Some(new_slug) = new_slug {
            active.slug = Set(new_slug.to_string());
        }

        match active.update(&self.conn).await {
            Ok(model) => Ok(SlugWrite::Ok(model)),
            Err(e) if is_unique_violation(&e, "categories.slug") => Ok(SlugWrite::SlugTaken),
            Err(e) => Err(e).context("Failed to update category"),
        }
    }

    /// Deleting a category detaches its titles rather than removing them.
    pub async fn delete(&self, slug: &str) -> Result<bool> {
        let Some(category) = self.get_by_slug(slug).await? else {
            return Ok(false);
        };

        Titles::update_many()
            .col_expr(titles::Column::CategoryId, sea_orm::sea_query::Expr::value(Option::<i32>::None))
            .filter(titles::Column::CategoryId.eq(category.id))
            .exec(&self.conn)
            .await?;

        categories::Entity::delete_by_id(category.id)
            .exec(&self.conn)
            .await?;

        Ok(true)
    }
}
