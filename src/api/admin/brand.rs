use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::get,
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
use crate::entities::brand::{self, Entity as BrandEntity};
use crate::middleware::logging::{json_ok, success, success_with, ApiError};
use crate::services::{
    catalog::{count_products_referencing, ProductReference},
    slug::checked_slug,
    validation::validate_payload,
};

//ROUTERS
pub fn admin_brand_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/brands", get(get_brands).post(create_brand))
        .route(
            "/brands/:id",
            get(get_brand).patch(patch_brand).delete(delete_brand),
        )
        .layer(Extension(db))
}

async fn ensure_slug_free<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = BrandEntity::find().filter(brand::Column::Slug.eq(slug));
    if let Some(id) = except {
        query = query.filter(brand::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ApiError::Conflict(
            "A brand with this slug already exists".to_owned(),
        ));
    }
    Ok(())
}

async fn find_brand<C: ConnectionTrait>(conn: &C, id: i32) -> Result<brand::Model, ApiError> {
    BrandEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No brand with {id} id was found")))
}

//ROUTES
async fn get_brands(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let brands = BrandEntity::find()
        .order_by_asc(brand::Column::Name)
        .all(&txn)
        .await?;
    txn.commit().await?;
    Ok(json_ok(brands))
}

async fn get_brand(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_brand(&txn, id).await?;
    txn.commit().await?;
    Ok(json_ok(found))
}

async fn create_brand(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateBrand>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;
    let slug = checked_slug(payload.slug.as_deref(), &payload.name)?;

    let txn = db.begin().await?;
    ensure_slug_free(&txn, &slug, None).await?;

    let created = brand::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        slug: Set(slug),
        description: Set(payload.description),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(brand_id = created.id, slug = %created.slug, "Brand created");
    Ok(success_with(StatusCode::CREATED, "Brand created", created))
}

async fn patch_brand(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchBrand>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let found = find_brand(&txn, id).await?;
    let name = payload.name.unwrap_or_else(|| found.name.clone());

    let mut active: brand::ActiveModel = found.into();
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

    Ok(success_with(StatusCode::OK, "Brand updated", updated))
}

async fn delete_brand(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_brand(&txn, id).await?;

    let in_use = count_products_referencing(&txn, ProductReference::Brand(found.id)).await?;
    if in_use > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete brand: {in_use} product(s) still use it"
        )));
    }

    BrandEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(brand_id = id, "Brand deleted");
    Ok(success(StatusCode::OK, "Brand deleted"))
}

//STRUCTS
#[derive(Clone, Debug, Deserialize, Validate)]
struct CreateBrand {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: String,
    slug: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct PatchBrand {
    #[serde(default, deserialize_with = "trimmed_option")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: Option<String>,
    slug: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
}
