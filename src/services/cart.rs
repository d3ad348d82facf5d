//! Cart ownership and line management.
//!
//! A cart belongs to either a signed-in user or a guest. Guests are tracked
//! by an opaque token in the `guest_session` cookie; a missing or unknown
//! token gets a fresh guest row and the caller must reissue the cookie.
//! The cookie is never renewed, so guests older than its max-age are
//! unreachable and get pruned whenever a new one is started.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::entities::{cart, cart_item, guest, product, product_variant};
use crate::middleware::{logging::ApiError, session::GUEST_COOKIE_DAYS};
use crate::services::catalog::{primary_images, variant_attributes};

pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartOwner {
    User(i32),
    Guest(i32),
}

#[derive(Clone, Debug)]
pub struct ResolvedOwner {
    pub owner: CartOwner,
    /// Set when a new guest session was started and the cookie must be sent.
    pub issued_token: Option<String>,
}

pub async fn resolve_owner<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<i32>,
    guest_token: Option<&str>,
) -> Result<ResolvedOwner, DbErr> {
    if let Some(user_id) = user_id {
        return Ok(ResolvedOwner {
            owner: CartOwner::User(user_id),
            issued_token: None,
        });
    }

    if let Some(token) = guest_token {
        let existing = guest::Entity::find()
            .filter(guest::Column::SessionToken.eq(token))
            .one(conn)
            .await?;
        if let Some(guest) = existing {
            return Ok(ResolvedOwner {
                owner: CartOwner::Guest(guest.id),
                issued_token: None,
            });
        }
        tracing::debug!("Unknown guest session, starting a new one");
    }

    let now = Utc::now();
    prune_expired_guests(conn, now).await?;

    let token = Uuid::new_v4().to_string();
    let guest = guest::ActiveModel {
        session_token: Set(token.clone()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(ResolvedOwner {
        owner: CartOwner::Guest(guest.id),
        issued_token: Some(token),
    })
}

/// Deletes guests whose cookie has expired, along with their carts.
pub async fn prune_expired_guests<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let cutoff = now - Duration::days(GUEST_COOKIE_DAYS);
    let expired: Vec<i32> = guest::Entity::find()
        .select_only()
        .column(guest::Column::Id)
        .filter(guest::Column::CreatedAt.lt(cutoff))
        .into_tuple()
        .all(conn)
        .await?;
    if expired.is_empty() {
        return Ok(0);
    }

    let carts: Vec<i32> = cart::Entity::find()
        .select_only()
        .column(cart::Column::Id)
        .filter(cart::Column::GuestId.is_in(expired.iter().copied()))
        .into_tuple()
        .all(conn)
        .await?;
    if !carts.is_empty() {
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.is_in(carts.iter().copied()))
            .exec(conn)
            .await?;
        cart::Entity::delete_many()
            .filter(cart::Column::Id.is_in(carts))
            .exec(conn)
            .await?;
    }

    let pruned = guest::Entity::delete_many()
        .filter(guest::Column::Id.is_in(expired))
        .exec(conn)
        .await?
        .rows_affected;
    tracing::info!(pruned, "Pruned expired guest sessions");
    Ok(pruned)
}

pub async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    owner: CartOwner,
) -> Result<Option<cart::Model>, DbErr> {
    let query = match owner {
        CartOwner::User(id) => cart::Entity::find().filter(cart::Column::UserId.eq(id)),
        CartOwner::Guest(id) => cart::Entity::find().filter(cart::Column::GuestId.eq(id)),
    };
    query.one(conn).await
}

pub async fn find_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    owner: CartOwner,
) -> Result<cart::Model, DbErr> {
    if let Some(existing) = find_cart(conn, owner).await? {
        return Ok(existing);
    }

    let (user_id, guest_id) = match owner {
        CartOwner::User(id) => (Some(id), None),
        CartOwner::Guest(id) => (None, Some(id)),
    };
    let now = Utc::now();
    cart::ActiveModel {
        user_id: Set(user_id),
        guest_id: Set(guest_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
}

async fn touch<C: ConnectionTrait>(conn: &C, cart_id: i32) -> Result<(), DbErr> {
    cart::Entity::update_many()
        .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart::Column::Id.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Adds `quantity` to the line for `variant_id`, creating it if needed.
async fn upsert_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: i32,
    variant_id: i32,
    quantity: i32,
) -> Result<cart_item::Model, DbErr> {
    let existing = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::VariantId.eq(variant_id))
        .one(conn)
        .await?;

    match existing {
        Some(item) => {
            let merged = (item.quantity + quantity).min(MAX_LINE_QUANTITY);
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(merged);
            item.update(conn).await
        }
        None => {
            cart_item::ActiveModel {
                cart_id: Set(cart_id),
                variant_id: Set(variant_id),
                quantity: Set(quantity.min(MAX_LINE_QUANTITY)),
                ..Default::default()
            }
            .insert(conn)
            .await
        }
    }
}

fn check_quantity(quantity: i32, min: i32) -> Result<(), ApiError> {
    if (min..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(ApiError::ValidationFail(format!(
            "Quantity must be between {min} and {MAX_LINE_QUANTITY}"
        )))
    }
}

pub async fn add_item<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
    variant_id: i32,
    quantity: i32,
) -> Result<cart_item::Model, ApiError> {
    check_quantity(quantity, 1)?;

    let (variant, product) = product_variant::Entity::find_by_id(variant_id)
        .find_also_related(product::Entity)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Variant {variant_id} not found")))?;

    if !product.is_some_and(|p| p.is_published) {
        return Err(ApiError::NotFound(format!("Variant {variant_id} not found")));
    }
    if !variant.in_stock {
        return Err(ApiError::BadRequest(format!(
            "Variant {} is out of stock",
            variant.sku
        )));
    }

    let item = upsert_line(conn, cart.id, variant.id, quantity).await?;
    touch(conn, cart.id).await?;
    Ok(item)
}

async fn owned_item<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
    item_id: i32,
) -> Result<cart_item::Model, ApiError> {
    cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Cart item {item_id} not found")))
}

/// Sets a line's quantity. Zero removes the line.
pub async fn set_quantity<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
    item_id: i32,
    quantity: i32,
) -> Result<(), ApiError> {
    check_quantity(quantity, 0)?;
    let item = owned_item(conn, cart, item_id).await?;

    if quantity == 0 {
        cart_item::Entity::delete_by_id(item.id).exec(conn).await?;
    } else {
        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.update(conn).await?;
    }
    touch(conn, cart.id).await?;
    Ok(())
}

pub async fn remove_item<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
    item_id: i32,
) -> Result<(), ApiError> {
    let item = owned_item(conn, cart, item_id).await?;
    cart_item::Entity::delete_by_id(item.id).exec(conn).await?;
    touch(conn, cart.id).await?;
    Ok(())
}

pub async fn clear<C: ConnectionTrait>(conn: &C, cart: &cart::Model) -> Result<u64, DbErr> {
    let result = cart_item::Entity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(conn)
        .await?;
    touch(conn, cart.id).await?;
    Ok(result.rows_affected)
}

#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub item_id: i32,
    pub variant_id: i32,
    pub sku: String,
    pub product_id: i32,
    pub product_name: String,
    pub product_slug: String,
    pub attributes: BTreeMap<String, String>,
    pub unit_price: f64,
    pub quantity: i32,
    pub line_total: f64,
    pub in_stock: bool,
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CartView {
    pub cart_id: Option<i32>,
    pub items: Vec<CartLine>,
    pub item_count: i32,
    pub subtotal: f64,
}

pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

impl CartView {
    fn from_lines(cart_id: Option<i32>, items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|line| line.quantity).sum();
        let subtotal = round_money(items.iter().map(|line| line.line_total).sum());
        Self {
            cart_id,
            items,
            item_count,
            subtotal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub async fn cart_view<C: ConnectionTrait>(
    conn: &C,
    cart: Option<&cart::Model>,
) -> Result<CartView, DbErr> {
    let Some(cart) = cart else {
        return Ok(CartView::default());
    };

    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .order_by_asc(cart_item::Column::Id)
        .find_also_related(product_variant::Entity)
        .all(conn)
        .await?;

    let variant_ids: Vec<i32> = rows
        .iter()
        .filter_map(|(_, variant)| variant.as_ref().map(|v| v.id))
        .collect();
    let product_ids: Vec<i32> = rows
        .iter()
        .filter_map(|(_, variant)| variant.as_ref().map(|v| v.product_id))
        .collect();

    let products: HashMap<i32, product::Model> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids.iter().copied()))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };
    let mut attributes = variant_attributes(conn, &variant_ids).await?;
    let images = primary_images(conn, &product_ids).await?;

    let mut lines = Vec::with_capacity(rows.len());
    for (item, variant) in rows {
        let Some(variant) = variant else { continue };
        let Some(product) = products.get(&variant.product_id) else {
            continue;
        };
        let unit_price = variant.effective_price();
        lines.push(CartLine {
            item_id: item.id,
            variant_id: variant.id,
            sku: variant.sku,
            product_id: product.id,
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            attributes: attributes.remove(&variant.id).unwrap_or_default(),
            unit_price,
            quantity: item.quantity,
            line_total: round_money(unit_price * f64::from(item.quantity)),
            in_stock: variant.in_stock && product.is_published,
            image: images.get(&product.id).cloned(),
        });
    }

    Ok(CartView::from_lines(Some(cart.id), lines))
}

/// Moves a guest's cart lines into the user's cart and drops the guest
/// session. Returns how many lines were merged.
pub async fn merge_guest_cart<C: ConnectionTrait>(
    conn: &C,
    guest_token: &str,
    user_id: i32,
) -> Result<usize, DbErr> {
    let Some(guest) = guest::Entity::find()
        .filter(guest::Column::SessionToken.eq(guest_token))
        .one(conn)
        .await?
    else {
        return Ok(0);
    };

    let mut merged = 0;
    if let Some(guest_cart) = find_cart(conn, CartOwner::Guest(guest.id)).await? {
        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(guest_cart.id))
            .all(conn)
            .await?;

        if !items.is_empty() {
            let user_cart = find_or_create_cart(conn, CartOwner::User(user_id)).await?;
            for item in &items {
                upsert_line(conn, user_cart.id, item.variant_id, item.quantity).await?;
            }
            touch(conn, user_cart.id).await?;
            merged = items.len();
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(guest_cart.id))
            .exec(conn)
            .await?;
        cart::Entity::delete_by_id(guest_cart.id).exec(conn).await?;
    }
    guest::Entity::delete_by_id(guest.id).exec(conn).await?;

    tracing::info!(user_id, merged, "Merged guest cart into user cart");
    Ok(merged)
}
