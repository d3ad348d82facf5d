use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::api::extract::Json;
use crate::entities::user::{self, Entity as UserEntity};
use crate::middleware::{
    auth::Claims,
    logging::{json_ok, success_with, ApiError},
};
use crate::services::validation::validate_payload;

pub fn profile_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/profile", get(get_profile).patch(patch_profile))
        .layer(Extension(db))
}

async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let profile = UserEntity::find_by_id(claims.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_owned()))?;
    txn.commit().await?;

    Ok(json_ok(profile))
}

async fn patch_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchProfile>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let profile = UserEntity::find_by_id(claims.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_owned()))?;

    let mut profile: user::ActiveModel = profile.into();
    if let Some(name) = payload.name {
        profile.name = Set(name.trim().to_owned());
    }
    let updated = profile.update(&txn).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::OK, "Profile updated", updated))
}

#[derive(Debug, Deserialize, Validate)]
struct PatchProfile {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: Option<String>,
}
