use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::is_unique_violation;
use crate::entities::{genre_titles, genres, prelude::*};

#[derive(Debug)]
pub enum GenreWrite {
    Ok(genres::Model),
    NotFound,
    SlugTaken,
}

pub struct GenreRepository {
    conn: DatabaseConnection,
}

impl GenreRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<genres::Model>, u64, u64)> {
        let paginator = Genres::find()
            .order_by_asc(genres::Column::Slug)
            .paginate(&self.conn, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok((items, totals.number_of_items, totals.number_of_pages))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<genres::Model>> {
        Genres::find()
            .filter(genres::Column::Slug.eq(slug))
            .one(&self.conn)
            .await
            .context("Failed to query genre by slug")
    }

    /// Resolves a list of slugs; the first unknown slug is reported back.
    pub async fn resolve_slugs(&self, slugs: &[String]) -> Result<Result<Vec<i32>, String>> {
        let mut ids = Vec::with_capacity(slugs.len());
        for slug in slugs {
            match self.get_by_slug(slug).await? {
                Some(genre) => ids.push(genre.id),
                None => return Ok(Err(slug.clone())),
            }
        }
        Ok(Ok(ids))
    }

    pub async fn create(&self, name: &str, slug: &str) -> Result<GenreWrite> {
        let active = genres::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(GenreWrite::Ok(model)),
            Err(e) if is_unique_violation(&e, "genres.slug") => Ok(GenreWrite::SlugTaken),
            Err(e) => Err(e).context("Failed to insert genre"),
        }
    }

    pub async fn update(
        &self,
        slug: &str,
        name: Option<&str>,
        new_slug: Option<&str>,
    ) -> Result<GenreWrite> {
        let Some(genre) = self.get_by_slug(slug).await? else {
            return Ok(GenreWrite::NotFound);
        };

        let mut active: genres::ActiveModel = genre.into();
        if let Some(name) = name {
            active.name = Set(name.to_string());
        }
        if let Some(new_slug) = new_slug {
            active.slug = Set(new_slug.to_string());
        }

        match active.update(&self.conn).await {
            Ok(model) => Ok(GenreWrite::Ok(model)),
            Err(e) if is_unique_violation(&e, "genres.slug") => Ok(GenreWrite::SlugTaken),
            Err(e) => Err(e).context("Failed to update genre"),
        }
    }

    /// Deleting a genre drops its association rows; titles stay.
    pub async fn delete(&self, slug: &str) -> Result<bool> {
        let Some(genre) = self.get_by_slug(slug).await? else {
            return Ok(false);
        };

        GenreTitles::delete_many()
            .filter(genre_titles::Column::GenreId.eq(genre.id))
            .exec(&self.conn)
            .await?;

        genres::Entity::delete_by_id(genre.id)
            .exec(&self.conn)
            .await?;

        Ok(true)
    }
}
