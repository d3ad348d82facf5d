use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::api::extract::{Json, Path};
use crate::config::AppConfig;
use crate::entities::{cart as cart_entity, user::Role};
use crate::middleware::{
    auth::{optional_auth_middleware, AuthState, Claims},
    logging::{json_ok, success, success_with, ApiError},
    session::{guest_cookie, read_cookie, with_cookies, GUEST_COOKIE},
};
use crate::services::{
    cart::{self, ResolvedOwner},
    validation::validate_payload,
};

//ROUTERS
pub fn cart_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    let auth_state = AuthState {
        db: db.clone(),
        secret: Arc::from(config.jwt_secret.as_str()),
        role: Role::User,
    };

    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:id", patch(patch_item).delete(remove_item))
        .layer(Extension(db))
        .layer(Extension(config))
        .layer(from_fn_with_state(auth_state, optional_auth_middleware))
}

async fn resolve(
    txn: &DatabaseTransaction,
    claims: Option<Extension<Claims>>,
    headers: &HeaderMap,
) -> Result<ResolvedOwner, ApiError> {
    let user_id = claims.map(|Extension(claims)| claims.user_id);
    let guest_token = read_cookie(headers, GUEST_COOKIE);
    Ok(cart::resolve_owner(txn, user_id, guest_token.as_deref()).await?)
}

/// Reissues the guest cookie when a new guest session was started.
fn respond(response: Response, owner: &ResolvedOwner, config: &AppConfig) -> Response {
    match &owner.issued_token {
        Some(token) => with_cookies(response, [guest_cookie(token, config.secure_cookies)]),
        None => response,
    }
}

async fn existing_cart(
    txn: &DatabaseTransaction,
    owner: &ResolvedOwner,
) -> Result<Option<cart_entity::Model>, ApiError> {
    Ok(cart::find_cart(txn, owner.owner).await?)
}

//ROUTES
async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    claims: Option<Extension<Claims>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let owner = resolve(&txn, claims, &headers).await?;
    let found = existing_cart(&txn, &owner).await?;
    let view = cart::cart_view(&txn, found.as_ref()).await?;
    txn.commit().await?;

    Ok(respond(json_ok(view), &owner, &config))
}

async fn add_item(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    claims: Option<Extension<Claims>>,
    headers: HeaderMap,
    Json(payload): Json<AddCartItem>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let owner = resolve(&txn, claims, &headers).await?;
    let cart = cart::find_or_create_cart(&txn, owner.owner).await?;
    cart::add_item(&txn, &cart, payload.variant_id, payload.quantity).await?;
    let view = cart::cart_view(&txn, Some(&cart)).await?;
    txn.commit().await?;

    Ok(respond(
        success_with(StatusCode::CREATED, "Item added to cart", view),
        &owner,
        &config,
    ))
}

async fn patch_item(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    claims: Option<Extension<Claims>>,
    headers: HeaderMap,
    Json(payload): Json<PatchCartItem>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let owner = resolve(&txn, claims, &headers).await?;
    let cart = existing_cart(&txn, &owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Cart item {id} not found")))?;
    cart::set_quantity(&txn, &cart, id, payload.quantity).await?;
    let view = cart::cart_view(&txn, Some(&cart)).await?;
    txn.commit().await?;

    Ok(respond(
        success_with(StatusCode::OK, "Cart updated", view),
        &owner,
        &config,
    ))
}

async fn remove_item(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    claims: Option<Extension<Claims>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let owner = resolve(&txn, claims, &headers).await?;
    let cart = existing_cart(&txn, &owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Cart item {id} not found")))?;
    cart::remove_item(&txn, &cart, id).await?;
    let view = cart::cart_view(&txn, Some(&cart)).await?;
    txn.commit().await?;

    Ok(respond(
        success_with(StatusCode::OK, "Item removed from cart", view),
        &owner,
        &config,
    ))
}

async fn clear_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<AppConfig>>,
    claims: Option<Extension<Claims>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let owner = resolve(&txn, claims, &headers).await?;
    if let Some(cart) = existing_cart(&txn, &owner).await? {
        cart::clear(&txn, &cart).await?;
    }
    txn.commit().await?;

    Ok(respond(success(StatusCode::OK, "Cart cleared"), &owner, &config))
}

//STRUCTS
fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
struct AddCartItem {
    variant_id: i32,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 99, message = "Quantity must be between 1 and 99"))]
    quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
struct PatchCartItem {
    #[validate(range(min = 0, max = 99, message = "Quantity must be between 0 and 99"))]
    quantity: i32,
}
