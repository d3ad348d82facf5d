pub mod attribute;
pub mod brand;
pub mod category;
pub mod collection;
pub mod image;
pub mod order;
pub mod product;
pub mod user;
pub mod variant;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

use attribute::admin_attribute_router;
use brand::admin_brand_router;
use category::admin_category_router;
use collection::admin_collection_router;
use image::admin_image_router;
use order::admin_order_router;
use product::admin_product_router;
use user::admin_user_router;
use variant::admin_variant_router;

use crate::config::AppConfig;
use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};

pub fn admin_api_router(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .merge(admin_brand_router(db.clone()))
        .merge(admin_category_router(db.clone()))
        .merge(admin_collection_router(db.clone()))
        .merge(admin_attribute_router(db.clone()))
        .merge(admin_product_router(db.clone()))
        .merge(admin_variant_router(db.clone()))
        .merge(admin_image_router(db.clone()))
        .merge(admin_order_router(db.clone()))
        .merge(admin_user_router(db.clone()))
        .route_layer(from_fn_with_state(
            AuthState {
                db,
                secret: Arc::from(config.jwt_secret.as_str()),
                role: Role::Admin,
            },
            auth_middleware,
        ))
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Strips surrounding whitespace while deserializing, so length checks see
/// the value that gets stored.
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|value| value.trim().to_owned())
}

pub(crate) fn trimmed_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|value| value.map(|v| v.trim().to_owned()))
}
