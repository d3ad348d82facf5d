use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::post,
    Router,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::extract::Json;
use crate::api::user::address::{save_address, AddressInput};
use crate::entities::address;
use crate::middleware::{
    auth::Claims,
    logging::{success_with, ApiError},
};
use crate::services::{checkout::place_order, validation::validate_payload};

pub fn checkout_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/checkout", post(checkout))
        .layer(Extension(db))
}

/// Ships to `address_id`, to a new inline `address` (saved to the address
/// book), or to the default address when neither is given.
async fn checkout(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<Checkout>,
) -> Result<Response, ApiError> {
    if let Some(input) = &payload.address {
        validate_payload(input)?;
    }

    let txn = db.begin().await?;
    let shipping = match (payload.address_id, payload.address) {
        (Some(id), _) => address::Entity::find_by_id(id)
            .filter(address::Column::UserId.eq(claims.user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("No address with {id} id was found")))?,
        (None, Some(input)) => save_address(&txn, claims.user_id, input).await?,
        (None, None) => address::Entity::find()
            .filter(address::Column::UserId.eq(claims.user_id))
            .filter(address::Column::IsDefault.eq(true))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ApiError::ValidationFail("A shipping address is required".to_owned())
            })?,
    };

    let placed = place_order(&txn, claims.user_id, shipping.snapshot()).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::CREATED, "Order placed", placed))
}

#[derive(Debug, Deserialize)]
struct Checkout {
    address_id: Option<i32>,
    address: Option<AddressInput>,
}
