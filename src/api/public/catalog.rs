use axum::{
    extract::Extension,
    response::Response,
    routing::get,
    Router,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;

use crate::api::extract::{Path, Query};
use crate::entities::{brand, category, collection};
use crate::middleware::logging::{json_ok, ApiError};
use crate::services::{catalog, filter::ProductFilter};

pub fn catalog_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/brands", get(get_brands))
        .route("/categories", get(get_categories))
        .route("/collections", get(get_collections))
        .route("/collections/:slug", get(get_collection))
        .layer(Extension(db))
}

async fn get_brands(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let brands = brand::Entity::find()
        .order_by_asc(brand::Column::Name)
        .all(&txn)
        .await?;
    txn.commit().await?;
    Ok(json_ok(brands))
}

async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let categories = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .all(&txn)
        .await?;
    txn.commit().await?;
    Ok(json_ok(categories))
}

async fn get_collections(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let collections = collection::Entity::find()
        .order_by_asc(collection::Column::Name)
        .all(&txn)
        .await?;
    txn.commit().await?;
    Ok(json_ok(collections))
}

/// The collection plus its products, accepting the same filters as `/products`.
async fn get_collection(
    Path(slug): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = collection::Entity::find()
        .filter(collection::Column::Slug.eq(slug.as_str()))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No collection with slug {slug} was found")))?;

    let mut filter = ProductFilter::from_pairs(&pairs);
    filter.collections.clear();
    filter.collections.insert(found.slug.clone());
    let products = catalog::list_products(&txn, &filter, false).await?;
    txn.commit().await?;

    Ok(json_ok(json!({
        "collection": found,
        "products": products,
    })))
}
