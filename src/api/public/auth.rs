use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::post,
    Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::api::extract::Json;
use crate::config::AppConfig;
use crate::entities::{
    hash_password,
    user::{self, Entity as UserEntity, Role},
};
use crate::middleware::{
    auth::generate_token,
    logging::{success, success_with, to_response, ApiError},
    session::{
        auth_cookie, expired_cookie, read_cookie, with_cookies, AUTH_COOKIE, GUEST_COOKIE,
    },
};
use crate::services::{cart::merge_guest_cart, validation::validate_payload};

pub fn auth_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .layer(Extension(db))
        .layer(Extension(config))
}

async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateUser>,
) -> Result<Response, ApiError> {
    let payload = CreateUser {
        email: payload.email.trim().to_lowercase(),
        ..payload
    };
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let existing = UserEntity::find()
        .filter(user::Column::Email.eq(payload.email.as_str()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "An account with this email already exists".to_owned(),
        ));
    }

    let password = hash_password(&payload.password)
        .map_err(|err| ApiError::PasswordHashFailed(err.to_string()))?;

    let created = user::ActiveModel {
        email: Set(payload.email),
        name: Set(payload.name.trim().to_owned()),
        password: Set(password),
        role: Set(Role::User),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(user_id = created.id, "Registered user");
    Ok(success_with(
        StatusCode::CREATED,
        "User registered successfully",
        created,
    ))
}

/// Issues a token (body and cookie) and folds the guest cart into the user's.
async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(payload): Json<UserLogin>,
) -> Result<Response, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_owned());

    let txn = db.begin().await?;
    let model = UserEntity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&txn)
        .await?
        .ok_or_else(invalid)?;
    model.check_hash(&payload.password).map_err(|_| invalid())?;

    let token = generate_token(
        model.id,
        model.role,
        &config.jwt_secret,
        config.token_ttl_hours,
    )
    .map_err(|err| ApiError::TokenGenerationFailed(err.to_string()))?;

    let guest_token = read_cookie(&headers, GUEST_COOKIE);
    if let Some(guest_token) = guest_token.as_deref() {
        merge_guest_cart(&txn, guest_token, model.id).await?;
    }
    txn.commit().await?;

    let mut cookies = vec![auth_cookie(
        &token,
        config.token_ttl_hours,
        config.secure_cookies,
    )];
    if guest_token.is_some() {
        cookies.push(expired_cookie(GUEST_COOKIE, config.secure_cookies));
    }

    let response = to_response(
        (
            StatusCode::OK,
            axum::Json(json!({
                "success": true,
                "message": "Logged in",
                "token": token,
                "user": model,
            })),
        ),
        Ok(()),
    );
    Ok(with_cookies(response, cookies))
}

async fn logout(Extension(config): Extension<Arc<AppConfig>>) -> Response {
    with_cookies(
        success(StatusCode::OK, "Logged out"),
        [expired_cookie(AUTH_COOKIE, config.secure_cookies)],
    )
}

//STRUCTS
#[derive(Clone, Debug, Deserialize, Validate)]
struct CreateUser {
    #[validate(email(message = "Please enter a valid email address"))]
    email: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    password: String,
}

#[derive(Clone, Deserialize)]
struct UserLogin {
    email: String,
    password: String,
}
