pub mod admin;
pub mod extract;
pub mod public;
pub mod user;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use admin::admin_api_router;
use public::public_api_router;
use user::user_api_router;

pub fn create_api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    let storefront = public_api_router(db.clone(), config.clone())
        .merge(user_api_router(db.clone(), config.clone()));

    Router::new()
        .nest("/api", storefront)
        .nest("/api/admin", admin_api_router(db, config))
}
