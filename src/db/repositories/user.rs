use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::is_unique_violation;
use crate::domain::Role;
use crate::entities::{access_tokens, comments, prelude::*, reviews, users};

/// Account data handed to the API layer. The confirmation code never leaves
/// the repository except through the signup delivery path.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl User {
    /// Elevated accounts bypass the role checks the way a superuser bit does.
    #[must_use]
    pub const fn is_elevated(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role.parse().unwrap_or_default(),
            bio: model.bio,
            first_name: model.first_name,
            last_name: model.last_name,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
        }
    }
}

/// Outcome of the idempotent signup upsert.
#[derive(Debug)]
pub enum SignupOutcome {
    /// Code stored; caller should attempt delivery.
    Issued(User),
    UsernameTaken,
    EmailTaken,
}

/// Outcome of a confirmation-code exchange attempt.
#[derive(Debug)]
pub enum CodeExchange {
    UnknownUser,
    /// Missing, mismatched or stale code.
    Invalid,
    Accepted(User),
}

/// Outcome of an admin-side create or update.
#[derive(Debug)]
pub enum UserWrite {
    Ok(User),
    NotFound,
    UsernameTaken,
    EmailTaken,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<User>, u64, u64)> {
        let paginator = users::Entity::find()
            .order_by_asc(users::Column::Username)
            .paginate(&self.conn, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok((
            items.into_iter().map(User::from).collect(),
            totals.number_of_items,
            totals.number_of_pages,
        ))
    }

    /// Idempotent signup keyed by the (username, email) pair: re-signing up
    /// with the same pair stores a fresh code; a username or email held by a
    /// different pairing is rejected.
    pub async fn store_signup_code(
        &self,
        username: &str,
        email: &str,
        code: &str,
    ) -> Result<SignupOutcome> {
        let now = chrono::Utc::now().to_rfc3339();

        if let Some(existing) = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for signup")?
        {
            if existing.email != email {
                return Ok(SignupOutcome::UsernameTaken);
            }

            let mut active: users::ActiveModel = existing.into();
            active.confirmation_code = Set(Some(code.to_string()));
            active.code_issued_at = Set(Some(now));
            let updated = active.update(&self.conn).await?;
            return Ok(SignupOutcome::Issued(User::from(updated)));
        }

        let email_held = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query email for signup")?;
        if email_held.is_some() {
            return Ok(SignupOutcome::EmailTaken);
        }

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            role: Set(Role::User.as_str().to_string()),
            is_staff: Set(false),
            is_superuser: Set(false),
            confirmation_code: Set(Some(code.to_string())),
            code_issued_at: Set(Some(now.clone())),
            created_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(SignupOutcome::Issued(User::from(model))),
            Err(e) if is_unique_violation(&e, "users.username") => Ok(SignupOutcome::UsernameTaken),
            Err(e) if is_unique_violation(&e, "users.email") => Ok(SignupOutcome::EmailTaken),
            Err(e) => Err(e).context("Failed to insert user at signup"),
        }
    }

    /// Validates and consumes a confirmation code. Accepted codes are cleared
    /// so a captured code cannot be replayed for further tokens.
    pub async fn consume_confirmation_code(
        &self,
        username: &str,
        code: &str,
        max_age_minutes: u64,
    ) -> Result<CodeExchange> {
        let Some(user) = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for code exchange")?
        else {
            return Ok(CodeExchange::UnknownUser);
        };

        let (Some(stored), Some(issued_at)) = (&user.confirmation_code, &user.code_issued_at)
        else {
            return Ok(CodeExchange::Invalid);
        };

        if stored != code {
            return Ok(CodeExchange::Invalid);
        }

        let max_age = i64::try_from(max_age_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX);
        let fresh = chrono::DateTime::parse_from_rfc3339(issued_at)
            .ok()
            .is_some_and(|issued| chrono::Utc::now().signed_duration_since(issued) <= max_age);
        if !fresh {
            return Ok(CodeExchange::Invalid);
        }

        let mut active: users::ActiveModel = user.into();
        active.confirmation_code = Set(None);
        active.code_issued_at = Set(None);
        let updated = active.update(&self.conn).await?;

        Ok(CodeExchange::Accepted(User::from(updated)))
    }

    /// Pending confirmation code, exposed for delivery and for tests.
    pub async fn pending_confirmation_code(&self, username: &str) -> Result<Option<String>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query confirmation code")?;

        Ok(user.and_then(|u| u.confirmation_code))
    }

    pub async fn create(
        &self,
        username: &str,
        email: &str,
        role: Role,
        changes: &UserChanges,
    ) -> Result<UserWrite> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            role: Set(role.as_str().to_string()),
            bio: Set(changes.bio.clone()),
            first_name: Set(changes.first_name.clone()),
            last_name: Set(changes.last_name.clone()),
            is_staff: Set(false),
            is_superuser: Set(false),
            created_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(UserWrite::Ok(User::from(model))),
            Err(e) if is_unique_violation(&e, "users.username") => Ok(UserWrite::UsernameTaken),
            Err(e) if is_unique_violation(&e, "users.email") => Ok(UserWrite::EmailTaken),
            Err(e) => Err(e).context("Failed to insert user"),
        }
    }

    pub async fn update(&self, username: &str, changes: &UserChanges) -> Result<UserWrite> {
        let Some(user) = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(UserWrite::NotFound);
        };

        let mut active: users::ActiveModel = user.into();
        if let Some(new_username) = &changes.username {
            active.username = Set(new_username.clone());
        }
        if let Some(email) = &changes.email {
            active.email = Set(email.clone());
        }
        if let Some(role) = changes.role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(bio) = &changes.bio {
            active.bio = Set(Some(bio.clone()));
        }
        if let Some(first_name) = &changes.first_name {
            active.first_name = Set(Some(first_name.clone()));
        }
        if let Some(last_name) = &changes.last_name {
            active.last_name = Set(Some(last_name.clone()));
        }

        match active.update(&self.conn).await {
            Ok(model) => Ok(UserWrite::Ok(User::from(model))),
            Err(e) if is_unique_violation(&e, "users.username") => Ok(UserWrite::UsernameTaken),
            Err(e) if is_unique_violation(&e, "users.email") => Ok(UserWrite::EmailTaken),
            Err(e) => Err(e).context("Failed to update user"),
        }
    }

    /// Removes the account and everything it authored. Expressed explicitly
    /// rather than trusting the connection's foreign-key pragma.
    pub async fn delete(&self, username: &str) -> Result<bool> {
        let Some(user) = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for deletion")?
        else {
            return Ok(false);
        };

        let review_ids: Vec<i32> = Reviews::find()
            .filter(reviews::Column::AuthorId.eq(user.id))
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

        Comments::delete_many()
            .filter(comments::Column::AuthorId.eq(user.id))
            .exec(&self.conn)
            .await?;

        AccessTokens::delete_many()
            .filter(access_tokens::Column::UserId.eq(user.id))
            .exec(&self.conn)
            .await?;

        users::Entity::delete_by_id(user.id).exec(&self.conn).await?;

        Ok(true)
    }
}
