use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;

use crate::entities::{categories, comments, genre_titles, genres, prelude::*, reviews, titles};

/// A title joined with everything its read representation needs: the expanded
/// category, the genre list and the derived rating.
#[derive(Debug, Clone)]
pub struct TitleWithMeta {
    pub title: titles::Model,
    pub category: Option<categories::Model>,
    pub genres: Vec<genres::Model>,
    /// Mean of the title's review scores; `None` when it has no reviews.
    pub rating: Option<f64>,
}

/// Optional list filters, combined with AND.
#[derive(Debug, Default, Clone)]
pub struct TitleFilter {
    pub category_slug: Option<String>,
    pub genre_slug: Option<String>,
    pub name: Option<String>,
    pub year: Option<i32>,
}

/// Fields of a title write; `None` leaves the stored value untouched.
#[derive(Debug, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    /// `Some(None)` detaches the category.
    pub category_id: Option<Option<i32>>,
    pub genre_ids: Option<Vec<i32>>,
}

pub struct TitleRepository {
    conn: DatabaseConnection,
}

impl TitleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(
        &self,
        filter: &TitleFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<TitleWithMeta>, u64, u64)> {
        let mut query = Titles::find().order_by_asc(titles::Column::Id);

        if let Some(slug) = &filter.category_slug {
            let Some(category) = Categories::find()
                .filter(categories::Column::Slug.eq(slug))
                .one(&self.conn)
                .await?
            else {
                return Ok((Vec::new(), 0, 0));
            };
            query = query.filter(titles::Column::CategoryId.eq(category.id));
        }

        if let Some(slug) = &filter.genre_slug {
            let Some(genre) = Genres::find()
                .filter(genres::Column::Slug.eq(slug))
                .one(&self.conn)
                .await?
            else {
                return Ok((Vec::new(), 0, 0));
            };
            let title_ids: Vec<i32> = GenreTitles::find()
                .filter(genre_titles::Column::GenreId.eq(genre.id))
                .all(&self.conn)
                .await?
                .into_iter()
                .map(|row| row.title_id)
                .collect();
            query = query.filter(titles::Column::Id.is_in(title_ids));
        }

        if let Some(name) = &filter.name {
            query = query.filter(titles::Column::Name.contains(name));
        }

        if let Some(year) = filter.year {
            query = query.filter(titles::Column::Year.eq(year));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page - 1).await?;

        let expanded = self.expand(items).await?;
        Ok((expanded, totals.number_of_items, totals.number_of_pages))
    }

    pub async fn get(&self, id: i32) -> Result<Option<TitleWithMeta>> {
        let Some(title) = Titles::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query title")?
        else {
            return Ok(None);
        };

        let mut expanded = self.expand(vec![title]).await?;
        Ok(expanded.pop())
    }

    pub async fn exists(&self, id: i32) -> Result<bool> {
        Ok(Titles::find_by_id(id).one(&self.conn).await?.is_some())
    }

    pub async fn create(
        &self,
        name: &str,
        year: i32,
        description: Option<&str>,
        category_id: i32,
        genre_ids: &[i32],
    ) -> Result<TitleWithMeta> {
        let active = titles::ActiveModel {
            name: Set(name.to_string()),
            year: Set(year),
            description: Set(description.map(str::to_string)),
            category_id: Set(Some(category_id)),
            ..Default::default()
        };
        let title = active
            .insert(&self.conn)
            .await
            .context("Failed to insert title")?;

        self.replace_genres(title.id, genre_ids).await?;

        self.get(title.id)
            .await?
            .context("Freshly inserted title vanished")
    }

    pub async fn update(&self, id: i32, changes: TitleChanges) -> Result<Option<TitleWithMeta>> {
        let Some(title) = Titles::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: titles::ActiveModel = title.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(year) = changes.year {
            active.year = Set(year);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id);
        }
        active.update(&self.conn).await?;

        if let Some(genre_ids) = changes.genre_ids {
            self.replace_genres(id, &genre_ids).await?;
        }

        self.get(id).await
    }

    /// Removes the title and its owned aggregate: association rows, reviews,
    /// and the comments hanging off those reviews.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let Some(title) = Titles::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let review_ids: Vec<i32> = Reviews::find()
            .filter(reviews::Column::TitleId.eq(title.id))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        if !review_ids.is_empty() {
            Comments::delete_many()
                .filter(comments::Column::ReviewId.is_in(review_ids.clone()))
                .exec(&self.conn)
                .await?;
            Reviews::delete_many()
                .filter(reviews::Column::Id.is_in(review_ids))
                .exec(&self.conn)
                .await?;
        }

        GenreTitles::delete_many()
            .filter(genre_titles::Column::TitleId.eq(title.id))
            .exec(&self.conn)
            .await?;

        titles::Entity::delete_by_id(title.id)
            .exec(&self.conn)
            .await?;

        Ok(true)
    }

    async fn replace_genres(&self, title_id: i32, genre_ids: &[i32]) -> Result<()> {
        GenreTitles::delete_many()
            .filter(genre_titles::Column::TitleId.eq(title_id))
            .exec(&self.conn)
            .await?;

        for genre_id in genre_ids {
            let row = genre_titles::ActiveModel {
                title_id: Set(title_id),
                genre_id: Set(*genre_id),
                ..Default::default()
            };
            row.insert(&self.conn).await?;
        }

        Ok(())
    }

    /// Joins one page of titles with categories, genres and review scores in
    /// three batched queries instead of per-row lookups.
    async fn expand(&self, items: Vec<titles::Model>) -> Result<Vec<TitleWithMeta>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let title_ids: Vec<i32> = items.iter().map(|t| t.id).collect();

        let category_ids: Vec<i32> = items.iter().filter_map(|t| t.category_id).collect();
        let categories_by_id: HashMap<i32, categories::Model> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            Categories::find()
                .filter(categories::Column::Id.is_in(category_ids))
                .all(&self.conn)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        let mut genres_by_title: HashMap<i32, Vec<genres::Model>> = HashMap::new();
        let genre_rows = GenreTitles::find()
            .filter(genre_titles::Column::TitleId.is_in(title_ids.clone()))
            .find_also_related(Genres)
            .all(&self.conn)
            .await?;
        for (link, genre) in genre_rows {
            if let Some(genre) = genre {
                genres_by_title.entry(link.title_id).or_default().push(genre);
            }
        }

        let scores: Vec<(i32, i16)> = Reviews::find()
            .select_only()
            .column(reviews::Column::TitleId)
            .column(reviews::Column::Score)
            .filter(reviews::Column::TitleId.is_in(title_ids))
            .into_tuple()
            .all(&self.conn)
            .await?;
        let mut score_sums: HashMap<i32, (i64, i64)> = HashMap::new();
        for (title_id, score) in scores {
            let entry = score_sums.entry(title_id).or_insert((0, 0));
            entry.0 += i64::from(score);
            entry.1 += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let expanded = items
            .into_iter()
            .map(|title| {
                let category = title
                    .category_id
                    .and_then(|id| categories_by_id.get(&id).cloned());
                let genres = genres_by_title.remove(&title.id).unwrap_or_default();
                let rating = score_sums
                    .get(&title.id)
                    .map(|(sum, count)| *sum as f64 / *count as f64);
                TitleWithMeta {
                    title,
                    category,
                    genres,
                    rating,
                }
            })
            .collect();

        Ok(expanded)
    }
}
