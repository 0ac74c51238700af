use chrono::Datelike;
use regex::Regex;
use std::sync::LazyLock;

use super::ApiError;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"));

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email pattern"));

/// "me" aliases the current-user endpoint and is rejected everywhere a
/// username is accepted.
pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    if username.is_empty() {
        return Err(ApiError::field("username", "Username cannot be empty"));
    }
    if username == "me" {
        return Err(ApiError::field("username", "Username \"me\" is not allowed"));
    }
    if username.len() > 50 {
        return Err(ApiError::field(
            "username",
            "Username must be 50 characters or less",
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::field(
            "username",
            "Username may only contain letters, digits and .@+-_",
        ));
    }
    Ok(username)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    if email.is_empty() {
        return Err(ApiError::field("email", "Email cannot be empty"));
    }
    if email.len() > 200 {
        return Err(ApiError::field(
            "email",
            "Email must be 200 characters or less",
        ));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::field("email", "Enter a valid email address"));
    }
    Ok(email)
}

pub fn validate_slug(slug: &str) -> Result<&str, ApiError> {
    if slug.is_empty() {
        return Err(ApiError::field("slug", "Slug cannot be empty"));
    }
    if slug.len() > 50 {
        return Err(ApiError::field("slug", "Slug must be 50 characters or less"));
    }
    if !SLUG_RE.is_match(slug) {
        return Err(ApiError::field(
            "slug",
            "Slug may only contain letters, digits, hyphens and underscores",
        ));
    }
    Ok(slug)
}

pub fn validate_name(name: &str) -> Result<&str, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::field("name", "Name cannot be empty"));
    }
    if name.len() > 200 {
        return Err(ApiError::field("name", "Name must be 200 characters or less"));
    }
    Ok(name)
}

pub fn validate_text(field: &str, text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::field(field, "This field cannot be blank"));
    }
    Ok(())
}

pub fn validate_score(score: i16) -> Result<i16, ApiError> {
    if !(1..=10).contains(&score) {
        return Err(ApiError::field("score", "Score must be between 1 and 10"));
    }
    Ok(score)
}

/// Titles cannot predate year 1 or postdate the current year.
pub fn validate_year(year: i32) -> Result<i32, ApiError> {
    let current = chrono::Utc::now().year();
    if year < 1 {
        return Err(ApiError::field("year", "Invalid year"));
    }
    if year > current {
        return Err(ApiError::field("year", "The year cannot be in the future"));
    }
    Ok(year)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.l-i_c+e@x").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("me").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert!(validate_username("bad space").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("admin@localhost").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email(&format!("{}@x.com", "a".repeat(200))).is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("sci-fi").is_ok());
        assert!(validate_slug("films_2020").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("no/slash").is_err());
        assert!(validate_slug(&"s".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(1).is_ok());
        assert!(validate_score(10).is_ok());
        assert!(validate_score(0).is_err());
        assert!(validate_score(11).is_err());
    }

    #[test]
    fn test_validate_year() {
        assert!(validate_year(1).is_ok());
        assert!(validate_year(1999).is_ok());
        assert!(validate_year(0).is_err());
        assert!(validate_year(-5).is_err());
        assert!(validate_year(chrono::Utc::now().year() + 1).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("text", "fine").is_ok());
        assert!(validate_text("text", "   ").is_err());
    }
}
