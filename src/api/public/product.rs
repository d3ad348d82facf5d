use axum::{
    extract::Extension,
    response::Response,
    routing::get,
    Router,
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde_json::json;
use std::{collections::BTreeMap, sync::Arc};

use crate::api::extract::{Path, Query};
use crate::middleware::logging::{json_ok, ApiError};
use crate::services::{
    catalog,
    filter::ProductFilter,
    variant::{resolve_variant, selectable_values},
};

pub fn product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", get(get_products))
        .route("/products/facets", get(get_facets))
        .route("/products/:slug", get(get_product))
        .route("/products/:slug/variant", get(get_variant))
        .layer(Extension(db))
}

async fn get_products(
    Query(pairs): Query<Vec<(String, String)>>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let filter = ProductFilter::from_pairs(&pairs);
    tracing::debug!(?filter, "Listing products");

    let txn = db.begin().await?;
    let page = catalog::list_products(&txn, &filter, false).await?;
    txn.commit().await?;

    Ok(json_ok(page))
}

async fn get_facets(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let facets = catalog::facets(&txn).await?;
    txn.commit().await?;

    Ok(json_ok(facets))
}

async fn get_product(
    Path(slug): Path<String>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let product = catalog::published_product_by_slug(&txn, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with slug {slug} was found")))?;
    let detail = catalog::product_detail(&txn, product).await?;
    txn.commit().await?;

    Ok(json_ok(detail))
}

/// `?color=red&size=m` resolves the matching variant and reports which
/// values stay selectable for each attribute.
async fn get_variant(
    Path(slug): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let selection: BTreeMap<String, String> = pairs
        .into_iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect();

    let txn = db.begin().await?;
    let product = catalog::published_product_by_slug(&txn, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with slug {slug} was found")))?;
    let variants = catalog::variant_views(&txn, product.id).await?;
    txn.commit().await?;

    let variant = resolve_variant(&variants, &selection);
    Ok(json_ok(json!({
        "selection": selection,
        "variant": variant,
        "available": variant.is_some_and(|v| v.in_stock),
        "selectable": selectable_values(&variants, &selection),
    })))
}
