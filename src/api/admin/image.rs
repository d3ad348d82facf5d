use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{delete, post},
    Router,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::product::{find_product, touch_product};
use crate::api::extract::{Json, Path};
use crate::entities::product_image;
use crate::middleware::logging::{success, success_with, ApiError};
use crate::services::validation::validate_payload;

pub fn admin_image_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products/:id/images", post(create_image))
        .route("/images/:id", delete(delete_image))
        .layer(Extension(db))
}

async fn clear_primary<C: ConnectionTrait>(conn: &C, product_id: i32) -> Result<(), DbErr> {
    product_image::Entity::update_many()
        .col_expr(product_image::Column::IsPrimary, Expr::value(false))
        .filter(product_image::Column::ProductId.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Images are URLs issued by the media service; nothing is uploaded here.
async fn create_image(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateImage>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let found = find_product(&txn, product_id).await?;

    let existing = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(found.id))
        .count(&txn)
        .await?;
    // First image is always primary.
    let is_primary = payload.is_primary || existing == 0;
    if is_primary {
        clear_primary(&txn, found.id).await?;
    }

    let created = product_image::ActiveModel {
        product_id: Set(found.id),
        url: Set(payload.url.trim().to_owned()),
        alt_text: Set(payload.alt_text.filter(|alt| !alt.trim().is_empty())),
        is_primary: Set(is_primary),
        sort_order: Set(payload.sort_order),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    touch_product(&txn, found.id).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::CREATED, "Image added", created))
}

async fn delete_image(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = product_image::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No image with {id} id was found")))?;

    product_image::Entity::delete_by_id(found.id)
        .exec(&txn)
        .await?;

    if found.is_primary {
        let next = product_image::Entity::find()
            .filter(product_image::Column::ProductId.eq(found.product_id))
            .order_by_asc(product_image::Column::SortOrder)
            .order_by_asc(product_image::Column::Id)
            .one(&txn)
            .await?;
        if let Some(next) = next {
            let mut next: product_image::ActiveModel = next.into();
            next.is_primary = Set(true);
            next.update(&txn).await?;
        }
    }
    touch_product(&txn, found.product_id).await?;
    txn.commit().await?;

    Ok(success(StatusCode::OK, "Image deleted"))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateImage {
    #[validate(url(message = "Image url must be a valid URL"))]
    url: String,
    #[validate(length(max = 300, message = "Alt text is too long"))]
    alt_text: Option<String>,
    #[serde(default)]
    is_primary: bool,
    #[serde(default)]
    sort_order: i32,
}
