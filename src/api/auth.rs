use axum::{
    Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::permissions::Identity;
use super::{ApiError, ApiResponse, AppState, ValidJson, validation};
use crate::db::{CodeExchange, SignupOutcome};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <token>` to an [`Identity`] stored in the
/// request extensions. No header means anonymous; a header that does not
/// resolve to a live token is rejected outright, even for reads.
pub async fn identify(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match bearer_token(request.headers()) {
        None => Identity::Anonymous,
        Some(Err(())) => {
            return Err(ApiError::unauthorized("Invalid authorization header"));
        }
        Some(Ok(token)) => {
            let user = state
                .store()
                .authenticate_token(&token)
                .await
                .map_err(|e| ApiError::internal(format!("Token lookup failed: {e}")))?;
            match user {
                Some(user) => {
                    tracing::Span::current().record("user_id", &user.username);
                    Identity::Known(user)
                }
                None => return Err(ApiError::unauthorized("Invalid or expired token")),
            }
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// `None` when no Authorization header is present, `Some(Err(()))` when the
/// header exists but is not a Bearer credential.
fn bearer_token(headers: &HeaderMap) -> Option<Result<String, ()>> {
    let header = headers.get("Authorization")?;

    let parsed = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    Some(parsed.ok_or(()))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/signup/
/// Issues a confirmation code and delivers it out of band. Idempotent for a
/// (username, email) pair: signing up again re-issues and re-delivers.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<SignupRequest>,
) -> Result<Json<ApiResponse<SignupResponse>>, ApiError> {
    validation::validate_username(&payload.username)?;
    validation::validate_email(&payload.email)?;

    let code = uuid::Uuid::new_v4().to_string();

    let outcome = state
        .store()
        .store_signup_code(&payload.username, &payload.email, &code)
        .await?;

    let user = match outcome {
        SignupOutcome::Issued(user) => user,
        SignupOutcome::UsernameTaken => {
            return Err(ApiError::field(
                "username",
                "This username is already registered with a different email",
            ));
        }
        SignupOutcome::EmailTaken => {
            return Err(ApiError::field(
                "email",
                "This email is already registered with a different username",
            ));
        }
    };

    // The code is already persisted; a delivery failure leaves signup
    // retryable without invalidating it.
    state
        .mailer()
        .deliver(&user.email, &user.username, &code)
        .await
        .map_err(|e| ApiError::MailDelivery(e.to_string()))?;

    tracing::info!("Confirmation code issued for {}", user.username);

    Ok(Json(ApiResponse::success(SignupResponse {
        username: user.username,
        email: user.email,
    })))
}

/// POST /auth/token/
/// Exchanges a delivered confirmation code for a bearer token. Codes are
/// single-use and expire per config.
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<TokenRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let (code_ttl, token_ttl) = {
        let config = state.config().read().await;
        (
            config.auth.confirmation_code_ttl_minutes,
            config.auth.token_ttl_hours,
        )
    };

    let exchange = state
        .store()
        .consume_confirmation_code(&payload.username, &payload.confirmation_code, code_ttl)
        .await?;

    let user = match exchange {
        CodeExchange::UnknownUser => {
            return Err(ApiError::not_found("User", &payload.username));
        }
        CodeExchange::Invalid => {
            return Err(ApiError::field(
                "confirmation_code",
                "Confirmation code is invalid",
            ));
        }
        CodeExchange::Accepted(user) => user,
    };

    let token = state.store().issue_token(user.id, token_ttl).await?;

    tracing::info!("Access token issued for {}", user.username);

    Ok(Json(ApiResponse::success(TokenResponse { token })))
}
