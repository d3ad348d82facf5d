use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::{trimmed, trimmed_option};
use crate::api::extract::{Json, Path};
use crate::entities::{
    collection::{self, Entity as CollectionEntity},
    product, product_collection,
};
use crate::middleware::logging::{json_ok, success, success_with, ApiError};
use crate::services::{
    catalog::{count_products_referencing, ProductReference},
    slug::checked_slug,
    validation::validate_payload,
};

//ROUTERS
pub fn admin_collection_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/collections", get(get_collections).post(create_collection))
        .route(
            "/collections/:id",
            get(get_collection).patch(patch_collection).delete(delete_collection),
        )
        .route("/collections/:id/products", post(add_product))
        .route(
            "/collections/:id/products/:product_id",
            delete(remove_product),
        )
        .layer(Extension(db))
}

async fn ensure_slug_free<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = CollectionEntity::find().filter(collection::Column::Slug.eq(slug));
    if let Some(id) = except {
        query = query.filter(collection::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ApiError::Conflict(
            "A collection with this slug already exists".to_owned(),
        ));
    }
    Ok(())
}

async fn find_collection<C: ConnectionTrait>(conn: &C, id: i32) -> Result<collection::Model, ApiError> {
    CollectionEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No collection with {id} id was found")))
}

//ROUTES
async fn get_collections(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let collections = CollectionEntity::find()
        .order_by_asc(collection::Column::Name)
        .all(&txn)
        .await?;
    txn.commit().await?;
    Ok(json_ok(collections))
}

async fn get_collection(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_collection(&txn, id).await?;
    txn.commit().await?;
    Ok(json_ok(found))
}

async fn create_collection(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateCollection>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;
    let slug = checked_slug(payload.slug.as_deref(), &payload.name)?;

    let txn = db.begin().await?;
    ensure_slug_free(&txn, &slug, None).await?;

    let created = collection::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        slug: Set(slug),
        description: Set(payload.description),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(collection_id = created.id, slug = %created.slug, "Collection created");
    Ok(success_with(StatusCode::CREATED, "Collection created", created))
}

async fn patch_collection(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCollection>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let found = find_collection(&txn, id).await?;
    let name = payload.name.unwrap_or_else(|| found.name.clone());

    let mut active: collection::ActiveModel = found.into();
    if let Some(slug) = payload.slug.as_deref() {
        let slug = checked_slug(Some(slug), &name)?;
        ensure_slug_free(&txn, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    active.name = Set(name.trim().to_owned());
    if let Some(description) = payload.description {
        active.description = Set(Some(description).filter(|d| !d.trim().is_empty()));
    }
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::OK, "Collection updated", updated))
}

async fn delete_collection(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_collection(&txn, id).await?;

    let in_use = count_products_referencing(&txn, ProductReference::Collection(found.id)).await?;
    if in_use > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete collection: {in_use} product(s) still use it"
        )));
    }

    CollectionEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(collection_id = id, "Collection deleted");
    Ok(success(StatusCode::OK, "Collection deleted"))
}

async fn add_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CollectionProduct>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_collection(&txn, id).await?;
    product::Entity::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No product with {} id was found", payload.product_id))
        })?;

    let existing = product_collection::Entity::find_by_id((payload.product_id, found.id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "Product is already in this collection".to_owned(),
        ));
    }

    product_collection::Entity::insert(product_collection::ActiveModel {
        product_id: Set(payload.product_id),
        collection_id: Set(found.id),
    })
    .exec_without_returning(&txn)
    .await?;
    txn.commit().await?;

    Ok(success(StatusCode::CREATED, "Product added to collection"))
}

async fn remove_product(
    Path((id, product_id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let result = product_collection::Entity::delete_by_id((product_id, id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound(format!(
            "Product {product_id} is not in collection {id}"
        )));
    }
    txn.commit().await?;

    Ok(success(StatusCode::OK, "Product removed from collection"))
}

//STRUCTS
#[derive(Debug, Deserialize)]
struct CollectionProduct {
    product_id: i32,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct CreateCollection {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: String,
    slug: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct PatchCollection {
    #[serde(default, deserialize_with = "trimmed_option")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: Option<String>,
    slug: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
}
