use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Serialize;

use crate::entities::{
    order::{self, Status},
    order_item,
};
use crate::middleware::logging::ApiError;
use crate::services::cart::{self, CartOwner};

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

pub async fn order_detail<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
) -> Result<OrderDetail, DbErr> {
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;
    Ok(OrderDetail { order, items })
}

/// Turns the user's cart into a pending order and empties the cart.
///
/// Prices are read from the variants at this moment and copied onto the order
/// items. Must run inside the caller's transaction so a failure leaves the
/// cart untouched.
pub async fn place_order<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    shipping_address: String,
) -> Result<OrderDetail, ApiError> {
    let cart = cart::find_cart(conn, CartOwner::User(user_id)).await?;
    let view = cart::cart_view(conn, cart.as_ref()).await?;
    let Some(cart) = cart.filter(|_| !view.is_empty()) else {
        return Err(ApiError::BadRequest("Your cart is empty".to_owned()));
    };

    if let Some(line) = view.items.iter().find(|line| !line.in_stock) {
        return Err(ApiError::BadRequest(format!(
            "{} ({}) is no longer available",
            line.product_name, line.sku
        )));
    }

    let order = order::ActiveModel {
        user_id: Set(Some(user_id)),
        status: Set(Status::Pending),
        total: Set(view.subtotal),
        shipping_address: Set(shipping_address),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(view.items.len());
    for line in &view.items {
        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            variant_id: Set(Some(line.variant_id)),
            product_name: Set(line.product_name.clone()),
            sku: Set(line.sku.clone()),
            unit_price: Set(line.unit_price),
            quantity: Set(line.quantity),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        items.push(item);
    }

    cart::clear(conn, &cart).await?;

    tracing::info!(
        order_id = order.id,
        user_id,
        total = order.total,
        lines = items.len(),
        "Order placed"
    );
    Ok(OrderDetail { order, items })
}
