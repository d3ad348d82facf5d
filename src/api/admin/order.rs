use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::api::extract::{Json, Path, Query};
use crate::entities::{
    order::{self, Entity as OrderEntity, Status},
    order_item,
};
use crate::middleware::logging::{json_ok, success, success_with, ApiError};
use crate::services::{
    checkout::{order_detail, OrderDetail},
    filter::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
};

//ROUTERS
pub fn admin_order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/orders", get(get_orders))
        .route(
            "/orders/:id",
            get(get_order).patch(patch_order).delete(delete_order),
        )
        .layer(Extension(db))
}

async fn find_order<C: ConnectionTrait>(conn: &C, id: i32) -> Result<order::Model, ApiError> {
    OrderEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with {id} id was found")))
}

fn parse_status(raw: &str) -> Result<Status, ApiError> {
    raw.trim()
        .to_lowercase()
        .parse::<Status>()
        .map_err(ApiError::ValidationFail)
}

//ROUTES
async fn get_orders(
    Query(params): Query<OrderQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut query = OrderEntity::find()
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id);
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        query = query.filter(order::Column::Status.eq(parse_status(status)?.as_str()));
    }

    let txn = db.begin().await?;
    let paginator = query.paginate(&txn, page_size);
    let total = paginator.num_items().await?;
    let orders = paginator.fetch_page(page - 1).await?;

    let ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let mut items: HashMap<i32, Vec<order_item::Model>> = HashMap::new();
    if !ids.is_empty() {
        for item in order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(ids))
            .order_by_asc(order_item::Column::Id)
            .all(&txn)
            .await?
        {
            items.entry(item.order_id).or_default().push(item);
        }
    }
    txn.commit().await?;

    let orders: Vec<OrderDetail> = orders
        .into_iter()
        .map(|order| OrderDetail {
            items: items.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect();

    Ok(json_ok(OrderPage {
        items: orders,
        total,
        page,
        page_size,
        total_pages: total.div_ceil(page_size),
    }))
}

async fn get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_order(&txn, id).await?;
    let detail = order_detail(&txn, found).await?;
    txn.commit().await?;

    Ok(json_ok(detail))
}

async fn patch_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchOrder>,
) -> Result<Response, ApiError> {
    let next = parse_status(&payload.status)?;

    let txn = db.begin().await?;
    let found = find_order(&txn, id).await?;
    let current = found.status;
    if current != next && !current.can_transition_to(next) {
        return Err(ApiError::Conflict(format!(
            "Cannot change order status from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: order::ActiveModel = found.into();
    active.status = Set(next);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = id,
        from = current.as_str(),
        to = next.as_str(),
        "Order status changed"
    );
    Ok(success_with(StatusCode::OK, "Order updated", updated))
}

async fn delete_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_order(&txn, id).await?;

    order_item::Entity::delete_many()
        .filter(order_item::Column::OrderId.eq(found.id))
        .exec(&txn)
        .await?;
    OrderEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(order_id = id, "Order deleted");
    Ok(success(StatusCode::OK, format!("Order {id} deleted")))
}

//STRUCTS
#[derive(Debug, Deserialize)]
struct OrderQuery {
    status: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PatchOrder {
    status: String,
}

#[derive(Debug, Serialize)]
struct OrderPage {
    items: Vec<OrderDetail>,
    total: u64,
    page: u64,
    page_size: u64,
    total_pages: u64,
}
