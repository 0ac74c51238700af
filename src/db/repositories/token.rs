use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use super::user::User;
use crate::entities::{access_tokens, prelude::*, users};

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Issues a fresh bearer token for the user, valid for `ttl_hours`.
    pub async fn issue(&self, user_id: i32, ttl_hours: u64) -> Result<String> {
        let token = generate_token();
        let now = chrono::Utc::now();
        let ttl = i64::try_from(ttl_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX);
        let expires = now
            .checked_add_signed(ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);

        let active = access_tokens::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.clone()),
            issued_at: Set(now.to_rfc3339()),
            expires_at: Set(expires.to_rfc3339()),
            ..Default::default()
        };
        active
            .insert(&self.conn)
            .await
            .context("Failed to store access token")?;

        Ok(token)
    }

    /// Resolves a presented bearer token to its user. Expired or unknown
    /// tokens resolve to `None`; expired rows are dropped on the way out.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>> {
        let Some(row) = AccessTokens::find()
            .filter(access_tokens::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query access token")?
        else {
            return Ok(None);
        };

        let valid = chrono::DateTime::parse_from_rfc3339(&row.expires_at)
            .ok()
            .is_some_and(|expires| chrono::Utc::now() < expires);

        if !valid {
            access_tokens::Entity::delete_by_id(row.id)
                .exec(&self.conn)
                .await?;
            return Ok(None);
        }

        let user = users::Entity::find_by_id(row.user_id)
            .one(&self.conn)
            .await
            .context("Failed to load token owner")?;

        Ok(user.map(User::from))
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = AccessTokens::delete_many()
            .filter(access_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }
}

/// Random 64-char hex string, the same shape the rest of the ecosystem uses
/// for opaque API credentials.
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
