pub mod address;
pub mod checkout;
pub mod order;
pub mod profile;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};
use address::address_router;
use checkout::checkout_router;
use order::order_router;
use profile::profile_router;

pub fn user_api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .merge(profile_router(db.clone()))
        .merge(address_router(db.clone()))
        .merge(checkout_router(db.clone()))
        .merge(order_router(db.clone()))
        .route_layer(from_fn_with_state(
            AuthState {
                db,
                secret: Arc::from(config.jwt_secret.as_str()),
                role: Role::User,
            },
            auth_middleware,
        ))
}
