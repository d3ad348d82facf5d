use axum::{
    extract::Extension,
    response::Response,
    routing::get,
    Router,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;

use crate::api::extract::Path;
use crate::entities::{order, order_item};
use crate::middleware::{
    auth::Claims,
    logging::{json_ok, ApiError},
};
use crate::services::checkout::{order_detail, OrderDetail};

pub fn order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/orders", get(get_orders))
        .route("/orders/:id", get(get_order))
        .layer(Extension(db))
}

async fn get_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let orders: Vec<OrderDetail> = order::Entity::find()
        .filter(order::Column::UserId.eq(claims.user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .find_with_related(order_item::Entity)
        .all(&txn)
        .await?
        .into_iter()
        .map(|(order, items)| OrderDetail { order, items })
        .collect();
    txn.commit().await?;

    Ok(json_ok(orders))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = order::Entity::find_by_id(id)
        .filter(order::Column::UserId.eq(claims.user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with {id} id was found")))?;
    let detail = order_detail(&txn, found).await?;
    txn.commit().await?;

    Ok(json_ok(detail))
}
