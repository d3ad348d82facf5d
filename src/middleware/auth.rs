use crate::entities::user::{Entity as UserEntity, Role};
use crate::middleware::{logging::ApiError, session};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};
use thiserror::Error;

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_owned()))?;

    let claims = validate_token(&state.db, &token, &state.secret, state.role)
        .await
        .map_err(|err| {
            tracing::debug!(error = %err, required = state.role.as_str(), "Rejected token");
            match err {
                AuthMiddlewareError::InternalServerError(message) => ApiError::DbError(message),
                AuthMiddlewareError::InsufficientRole => {
                    ApiError::Forbidden("You do not have access to this resource".to_owned())
                }
                _ => ApiError::Unauthorized("Invalid or expired session".to_owned()),
            }
        })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Attaches [`Claims`] when a valid token is present, and lets the request
/// through untouched otherwise. Used by routes that serve guests too.
pub async fn optional_auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(req.headers()) {
        match validate_token(&state.db, &token, &state.secret, state.role).await {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(err) => tracing::debug!(error = %err, "Ignoring invalid token on optional route"),
        }
    }
    next.run(req).await
}

/// Bearer header wins over the cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    bearer.or_else(|| session::read_cookie(headers, session::AUTH_COOKIE))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub secret: Arc<str>,
    pub role: Role,
}

pub fn generate_token(
    user_id: i32,
    role: Role,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp() as usize;

    let claims = Claims {
        user_id,
        role: role.as_str().to_owned(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthMiddlewareError::TokenExpired)
}

/// Decodes the token and re-checks the account, so role changes and deleted
/// users take effect before the token expires.
pub async fn validate_token(
    db: &DatabaseConnection,
    token: &str,
    secret: &str,
    req_role: Role,
) -> Result<Claims, AuthMiddlewareError> {
    let claims = decode_token(token, secret)?;
    Role::from_str(&claims.role).map_err(|_| AuthMiddlewareError::ValidationFail)?;

    let user = UserEntity::find_by_id(claims.user_id)
        .one(db)
        .await
        .map_err(|err| AuthMiddlewareError::InternalServerError(err.to_string()))?
        .ok_or(AuthMiddlewareError::InvalidUserOrRole)?;

    if user.role.as_str() != claims.role {
        return Err(AuthMiddlewareError::InvalidUserOrRole);
    }
    if !user.role.permits(req_role) {
        return Err(AuthMiddlewareError::InsufficientRole);
    }

    Ok(claims)
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Invalid user id or role")]
    InvalidUserOrRole,
    #[error("Role does not grant access")]
    InsufficientRole,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}
