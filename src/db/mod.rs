use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::Role;

pub mod migrator;
pub mod repositories;

pub use repositories::category::SlugWrite;
pub use repositories::comment::CommentWithAuthor;
pub use repositories::genre::GenreWrite;
pub use repositories::review::ReviewWithAuthor;
pub use repositories::title::{TitleChanges, TitleFilter, TitleWithMeta};
pub use repositories::user::{CodeExchange, SignupOutcome, User, UserChanges, UserWrite};

use crate::entities::{categories, comments, genres, reviews};

/// SQLite reports constraint breaches as "UNIQUE constraint failed:
/// table.column"; match on the qualified column to keep racing writers from
/// being reported as internal errors.
pub(crate) fn is_unique_violation(err: &DbErr, column: &str) -> bool {
    err.to_string()
        .contains(&format!("UNIQUE constraint failed: {column}"))
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // An in-memory SQLite database is private to its connection; cap the
        // pool at one so every query sees the migrated schema.
        let in_memory = db_url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { max_connections };
        let min_connections = if in_memory { 1 } else { min_connections };

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    fn category_repo(&self) -> repositories::category::CategoryRepository {
        repositories::category::CategoryRepository::new(self.conn.clone())
    }

    fn genre_repo(&self) -> repositories::genre::GenreRepository {
        repositories::genre::GenreRepository::new(self.conn.clone())
    }

    fn title_repo(&self) -> repositories::title::TitleRepository {
        repositories::title::TitleRepository::new(self.conn.clone())
    }

    fn review_repo(&self) -> repositories::review::ReviewRepository {
        repositories::review::ReviewRepository::new(self.conn.clone())
    }

    fn comment_repo(&self) -> repositories::comment::CommentRepository {
        repositories::comment::CommentRepository::new(self.conn.clone())
    }

    // Users

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn list_users(&self, page: u64, page_size: u64) -> Result<(Vec<User>, u64, u64)> {
        self.user_repo().list(page, page_size).await
    }

    pub async fn store_signup_code(
        &self,
        username: &str,
        email: &str,
        code: &str,
    ) -> Result<SignupOutcome> {
        self.user_repo()
            .store_signup_code(username, email, code)
            .await
    }

    pub async fn consume_confirmation_code(
        &self,
        username: &str,
        code: &str,
        max_age_minutes: u64,
    ) -> Result<CodeExchange> {
        self.user_repo()
            .consume_confirmation_code(username, code, max_age_minutes)
            .await
    }

    pub async fn pending_confirmation_code(&self, username: &str) -> Result<Option<String>> {
        self.user_repo().pending_confirmation_code(username).await
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        role: Role,
        changes: &UserChanges,
    ) -> Result<UserWrite> {
        self.user_repo().create(username, email, role, changes).await
    }

    pub async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<UserWrite> {
        self.user_repo().update(username, changes).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<bool> {
        self.user_repo().delete(username).await
    }

    // Access tokens

    pub async fn issue_token(&self, user_id: i32, ttl_hours: u64) -> Result<String> {
        self.token_repo().issue(user_id, ttl_hours).await
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<Option<User>> {
        self.token_repo().authenticate(token).await
    }

    pub async fn purge_expired_tokens(&self) -> Result<u64> {
        self.token_repo().purge_expired().await
    }

    // Categories

    pub async fn list_categories(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<categories::Model>, u64, u64)> {
        self.category_repo().list(page, page_size).await
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Option<categories::Model>> {
        self.category_repo().get_by_slug(slug).await
    }

    pub async fn create_category(&self, name: &str, slug: &str) -> Result<SlugWrite> {
        self.category_repo().create(name, slug).await
    }

    pub async fn update_category(
        &self,
        slug: &str,
        name: Option<&str>,
        new_slug: Option<&str>,
    ) -> Result<SlugWrite> {
        self.category_repo().update(slug, name, new_slug).await
    }

    pub async fn delete_category(&self, slug: &str) -> Result<bool> {
        self.category_repo().delete(slug).await
    }

    // Genres

    pub async fn list_genres(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<genres::Model>, u64, u64)> {
        self.genre_repo().list(page, page_size).await
    }

    pub async fn get_genre_by_slug(&self, slug: &str) -> Result<Option<genres::Model>> {
        self.genre_repo().get_by_slug(slug).await
    }

    pub async fn resolve_genre_slugs(&self, slugs: &[String]) -> Result<Result<Vec<i32>, String>> {
        self.genre_repo().resolve_slugs(slugs).await
    }

    pub async fn create_genre(&self, name: &str, slug: &str) -> Result<GenreWrite> {
        self.genre_repo().create(name, slug).await
    }

    pub async fn update_genre(
        &self,
        slug: &str,
        name: Option<&str>,
        new_slug: Option<&str>,
    ) -> Result<GenreWrite> {
        self.genre_repo().update(slug, name, new_slug).await
    }

    pub async fn delete_genre(&self, slug: &str) -> Result<bool> {
        self.genre_repo().delete(slug).await
    }

    // Titles

    pub async fn list_titles(
        &self,
        filter: &TitleFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<TitleWithMeta>, u64, u64)> {
        self.title_repo().list(filter, page, page_size).await
    }

    pub async fn get_title(&self, id: i32) -> Result<Option<TitleWithMeta>> {
        self.title_repo().get(id).await
    }

    pub async fn title_exists(&self, id: i32) -> Result<bool> {
        self.title_repo().exists(id).await
    }

    pub async fn create_title(
        &self,
        name: &str,
        year: i32,
        description: Option<&str>,
        category_id: i32,
        genre_ids: &[i32],
    ) -> Result<TitleWithMeta> {
        self.title_repo()
            .create(name, year, description, category_id, genre_ids)
            .await
    }

    pub async fn update_title(
        &self,
        id: i32,
        changes: TitleChanges,
    ) -> Result<Option<TitleWithMeta>> {
        self.title_repo().update(id, changes).await
    }

    pub async fn delete_title(&self, id: i32) -> Result<bool> {
        self.title_repo().delete(id).await
    }

    // Reviews

    pub async fn list_reviews_for_title(
        &self,
        title_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<ReviewWithAuthor>, u64, u64)> {
        self.review_repo()
            .list_for_title(title_id, page, page_size)
            .await
    }

    pub async fn get_review(&self, title_id: i32, id: i32) -> Result<Option<ReviewWithAuthor>> {
        self.review_repo().get(title_id, id).await
    }

    pub async fn review_exists_for(&self, title_id: i32, author_id: i32) -> Result<bool> {
        self.review_repo().exists_for(title_id, author_id).await
    }

    pub async fn create_review(
        &self,
        title_id: i32,
        author_id: i32,
        text: &str,
        score: i16,
    ) -> Result<Option<reviews::Model>> {
        self.review_repo()
            .create(title_id, author_id, text, score)
            .await
    }

    pub async fn update_review(
        &self,
        id: i32,
        text: Option<&str>,
        score: Option<i16>,
    ) -> Result<Option<reviews::Model>> {
        self.review_repo().update(id, text, score).await
    }

    pub async fn delete_review(&self, id: i32) -> Result<bool> {
        self.review_repo().delete(id).await
    }

    // Comments

    pub async fn list_comments_for_review(
        &self,
        review_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<CommentWithAuthor>, u64, u64)> {
        self.comment_repo()
            .list_for_review(review_id, page, page_size)
            .await
    }

    pub async fn get_comment(&self, review_id: i32, id: i32) -> Result<Option<CommentWithAuthor>> {
        self.comment_repo().get(review_id, id).await
    }

    pub async fn create_comment(
        &self,
        review_id: i32,
        author_id: i32,
        text: &str,
    ) -> Result<comments::Model> {
        self.comment_repo().create(review_id, author_id, text).await
    }

    pub async fn update_comment(&self, id: i32, text: &str) -> Result<Option<comments::Model>> {
        self.comment_repo().update(id, text).await
    }

    pub async fn delete_comment(&self, id: i32) -> Result<bool> {
        self.comment_repo().delete(id).await
    }
}
