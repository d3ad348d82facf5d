pub mod api;
pub mod config;
pub mod entities;
pub mod middleware;
pub mod services;

use axum::Router;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::{sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;

use crate::api::create_api_router;
use crate::config::AppConfig;
use crate::entities::{seed_admin, setup_schema};
use crate::middleware::logging::logging_middleware;

/// Connects, creates missing tables and seeds the admin account.
pub async fn prepare_database(config: &AppConfig) -> Result<Arc<DatabaseConnection>, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    setup_schema(&db).await?;

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        seed_admin(&db, email, password).await?;
    }

    Ok(Arc::new(db))
}

pub fn app(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Router {
    create_api_router(db, config)
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}
