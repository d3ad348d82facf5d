use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{delete, get},
    Router,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::api::extract::{Json, Path};
use crate::entities::address;
use crate::middleware::{
    auth::Claims,
    logging::{json_ok, success, success_with, ApiError},
};
use crate::services::validation::validate_payload;

pub fn address_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/addresses", get(get_addresses).post(create_address))
        .route("/addresses/:id", delete(delete_address))
        .layer(Extension(db))
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 120, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, max = 200, message = "Address line is required"))]
    pub line1: String,
    #[validate(length(max = 200, message = "Address line 2 is too long"))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 20, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100, message = "Country is required"))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Stores an address for the user. The first one, or one flagged as default,
/// becomes the only default.
pub async fn save_address<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    input: AddressInput,
) -> Result<address::Model, DbErr> {
    let existing = address::Entity::find()
        .filter(address::Column::UserId.eq(user_id))
        .count(conn)
        .await?;
    let is_default = input.is_default || existing == 0;

    if is_default {
        address::Entity::update_many()
            .col_expr(address::Column::IsDefault, Expr::value(false))
            .filter(address::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
    }

    address::ActiveModel {
        user_id: Set(user_id),
        full_name: Set(input.full_name.trim().to_owned()),
        line1: Set(input.line1.trim().to_owned()),
        line2: Set(input
            .line2
            .map(|line| line.trim().to_owned())
            .filter(|line| !line.is_empty())),
        city: Set(input.city.trim().to_owned()),
        postal_code: Set(input.postal_code.trim().to_owned()),
        country: Set(input.country.trim().to_owned()),
        is_default: Set(is_default),
        ..Default::default()
    }
    .insert(conn)
    .await
}

async fn get_addresses(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let addresses = address::Entity::find()
        .filter(address::Column::UserId.eq(claims.user_id))
        .order_by_desc(address::Column::IsDefault)
        .order_by_asc(address::Column::Id)
        .all(&txn)
        .await?;
    txn.commit().await?;

    Ok(json_ok(addresses))
}

async fn create_address(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddressInput>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let created = save_address(&txn, claims.user_id, payload).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::CREATED, "Address saved", created))
}

async fn delete_address(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = address::Entity::find_by_id(id)
        .filter(address::Column::UserId.eq(claims.user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No address with {id} id was found")))?;

    address::Entity::delete_by_id(found.id).exec(&txn).await?;

    // Hand the default flag to the oldest remaining address.
    if found.is_default {
        let next = address::Entity::find()
            .filter(address::Column::UserId.eq(claims.user_id))
            .order_by_asc(address::Column::Id)
            .one(&txn)
            .await?;
        if let Some(next) = next {
            let mut next: address::ActiveModel = next.into();
            next.is_default = Set(true);
            next.update(&txn).await?;
        }
    }
    txn.commit().await?;

    Ok(success(StatusCode::OK, "Address deleted"))
}
