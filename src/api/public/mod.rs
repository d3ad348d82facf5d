pub mod auth;
pub mod cart;
pub mod catalog;
pub mod newsletter;
pub mod product;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use auth::auth_router;
use cart::cart_router;
use catalog::catalog_router;
use newsletter::newsletter_router;
use product::product_router;

pub fn public_api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    let auth_router = auth_router(db.clone(), config.clone());
    let cart_router = cart_router(db.clone(), config);
    let catalog_router = catalog_router(db.clone());
    let newsletter_router = newsletter_router(db.clone());
    let product_router = product_router(db);

    Router::new()
        .merge(auth_router)
        .merge(cart_router)
        .merge(catalog_router)
        .merge(newsletter_router)
        .merge(product_router)
}
