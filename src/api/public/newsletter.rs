use axum::{extract::Extension, http::StatusCode, response::Response, routing::post, Router};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::api::extract::Json;
use crate::entities::newsletter_subscriber;
use crate::middleware::logging::{success, ApiError};
use crate::services::validation::validate_payload;

pub fn newsletter_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/newsletter", post(subscribe))
        .layer(Extension(db))
}

async fn subscribe(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<Subscribe>,
) -> Result<Response, ApiError> {
    let payload = Subscribe {
        email: payload.email.trim().to_lowercase(),
    };
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let existing = newsletter_subscriber::Entity::find()
        .filter(newsletter_subscriber::Column::Email.eq(payload.email.as_str()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "This email is already subscribed".to_owned(),
        ));
    }

    newsletter_subscriber::ActiveModel {
        email: Set(payload.email.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(email = %payload.email, "Newsletter subscription added");
    Ok(success(StatusCode::CREATED, "Subscribed to the newsletter"))
}

#[derive(Debug, Deserialize, Validate)]
struct Subscribe {
    #[validate(email(message = "Please enter a valid email address"))]
    email: String,
}
