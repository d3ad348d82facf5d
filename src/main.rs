use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use storefront::{app, config::AppConfig, prepare_database};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,sea_orm=warn")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(?config, "Loaded configuration");

    let db = prepare_database(&config).await?;

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app(db, config)).await?;
    Ok(())
}
