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
use crate::entities::category::{self, Entity as CategoryEntity};
use crate::middleware::logging::{json_ok, success, success_with, ApiError};
use crate::services::{
    catalog::{count_products_referencing, ProductReference},
    slug::checked_slug,
    validation::validate_payload,
};

//ROUTERS
pub fn admin_category_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/categories", get(get_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category).patch(patch_category).delete(delete_category),
        )
        .layer(Extension(db))
}

async fn ensure_slug_free<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = CategoryEntity::find().filter(category::Column::Slug.eq(slug));
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ApiError::Conflict(
            "A category with this slug already exists".to_owned(),
        ));
    }
    Ok(())
}

async fn find_category<C: ConnectionTrait>(conn: &C, id: i32) -> Result<category::Model, ApiError> {
    CategoryEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No category with {id} id was found")))
}

//ROUTES
async fn get_categories(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let categories = CategoryEntity::find()
        .order_by_asc(category::Column::Name)
        .all(&txn)
        .await?;
    txn.commit().await?;
    Ok(json_ok(categories))
}

async fn get_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_category(&txn, id).await?;
    txn.commit().await?;
    Ok(json_ok(found))
}

async fn create_category(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateCategory>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;
    let slug = checked_slug(payload.slug.as_deref(), &payload.name)?;

    let txn = db.begin().await?;
    ensure_slug_free(&txn, &slug, None).await?;

    let created = category::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        slug: Set(slug),
        description: Set(payload.description),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(category_id = created.id, slug = %created.slug, "Category created");
    Ok(success_with(StatusCode::CREATED, "Category created", created))
}

async fn patch_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchCategory>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let found = find_category(&txn, id).await?;
    let name = payload.name.unwrap_or_else(|| found.name.clone());

    let mut active: category::ActiveModel = found.into();
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

    Ok(success_with(StatusCode::OK, "Category updated", updated))
}

async fn delete_category(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_category(&txn, id).await?;

    let in_use = count_products_referencing(&txn, ProductReference::Category(found.id)).await?;
    if in_use > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete category: {in_use} product(s) still use it"
        )));
    }

    CategoryEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(category_id = id, "Category deleted");
    Ok(success(StatusCode::OK, "Category deleted"))
}

//STRUCTS
#[derive(Clone, Debug, Deserialize, Validate)]
struct CreateCategory {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: String,
    slug: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct PatchCategory {
    #[serde(default, deserialize_with = "trimmed_option")]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: Option<String>,
    slug: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    description: Option<String>,
}
