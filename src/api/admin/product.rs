use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::{double_option, trimmed, trimmed_option};
use crate::api::extract::{Json, Path, Query};
use crate::entities::{
    brand, cart_item, category, collection, order_item,
    product::{self, Entity as ProductEntity, Gender},
    product_collection, product_image, product_variant, variant_attribute_value,
};
use crate::middleware::logging::{json_ok, success, success_with, ApiError};
use crate::services::{
    catalog::{self, product_detail},
    filter::ProductFilter,
    slug::checked_slug,
    validation::validate_payload,
};

//ROUTERS
pub fn admin_product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", get(get_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).patch(patch_product).delete(delete_product),
        )
        .layer(Extension(db))
}

pub(super) async fn find_product<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<product::Model, ApiError> {
    ProductEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No product with {id} id was found")))
}

pub(super) async fn touch_product<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), DbErr> {
    ProductEntity::update_many()
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Removes variants and everything hanging off them. Order lines keep their
/// copied name, SKU and price but lose the variant link.
pub(super) async fn delete_variants<C: ConnectionTrait>(
    conn: &C,
    variant_ids: &[i32],
) -> Result<(), DbErr> {
    if variant_ids.is_empty() {
        return Ok(());
    }
    let ids = || variant_ids.iter().copied();

    order_item::Entity::update_many()
        .col_expr(order_item::Column::VariantId, Expr::value(Option::<i32>::None))
        .filter(order_item::Column::VariantId.is_in(ids()))
        .exec(conn)
        .await?;
    cart_item::Entity::delete_many()
        .filter(cart_item::Column::VariantId.is_in(ids()))
        .exec(conn)
        .await?;
    variant_attribute_value::Entity::delete_many()
        .filter(variant_attribute_value::Column::VariantId.is_in(ids()))
        .exec(conn)
        .await?;
    product_variant::Entity::delete_many()
        .filter(product_variant::Column::Id.is_in(ids()))
        .exec(conn)
        .await?;
    Ok(())
}

async fn ensure_slug_free<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = ProductEntity::find().filter(product::Column::Slug.eq(slug));
    if let Some(id) = except {
        query = query.filter(product::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ApiError::Conflict(
            "A product with this slug already exists".to_owned(),
        ));
    }
    Ok(())
}

async fn ensure_references<C: ConnectionTrait>(
    conn: &C,
    brand_id: Option<i32>,
    category_id: Option<i32>,
) -> Result<(), ApiError> {
    if let Some(id) = brand_id {
        brand::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ApiError::BadRequest(format!("No brand with {id} id was found")))?;
    }
    if let Some(id) = category_id {
        category::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ApiError::BadRequest(format!("No category with {id} id was found")))?;
    }
    Ok(())
}

async fn set_collections<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    collection_ids: &[i32],
) -> Result<(), ApiError> {
    let mut ids = collection_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let found = collection::Entity::find()
        .filter(collection::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;
    if found.len() != ids.len() {
        return Err(ApiError::BadRequest(
            "One or more collections do not exist".to_owned(),
        ));
    }

    product_collection::Entity::delete_many()
        .filter(product_collection::Column::ProductId.eq(product_id))
        .exec(conn)
        .await?;
    if !ids.is_empty() {
        product_collection::Entity::insert_many(ids.into_iter().map(|collection_id| {
            product_collection::ActiveModel {
                product_id: Set(product_id),
                collection_id: Set(collection_id),
            }
        }))
        .exec_without_returning(conn)
        .await?;
    }
    Ok(())
}

//ROUTES
/// Same filters as the storefront listing, unpublished products included.
async fn get_products(
    Query(pairs): Query<Vec<(String, String)>>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let filter = ProductFilter::from_pairs(&pairs);

    let txn = db.begin().await?;
    let page = catalog::list_products(&txn, &filter, true).await?;
    txn.commit().await?;

    Ok(json_ok(page))
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_product(&txn, id).await?;
    let detail = product_detail(&txn, found).await?;
    txn.commit().await?;

    Ok(json_ok(detail))
}

async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateProduct>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;
    let slug = checked_slug(payload.slug.as_deref(), &payload.name)?;

    let txn = db.begin().await?;
    ensure_slug_free(&txn, &slug, None).await?;
    ensure_references(&txn, payload.brand_id, payload.category_id).await?;

    let now = Utc::now();
    let created = product::ActiveModel {
        name: Set(payload.name.trim().to_owned()),
        slug: Set(slug),
        description: Set(payload.description),
        brand_id: Set(payload.brand_id),
        category_id: Set(payload.category_id),
        gender: Set(payload.gender),
        is_featured: Set(payload.is_featured),
        is_published: Set(payload.is_published),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if let Some(collection_ids) = &payload.collection_ids {
        set_collections(&txn, created.id, collection_ids).await?;
    }

    let detail = product_detail(&txn, created).await?;
    txn.commit().await?;

    tracing::info!(product_id = detail.id, slug = %detail.slug, "Product created");
    Ok(success_with(StatusCode::CREATED, "Product created", detail))
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchProduct>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let found = find_product(&txn, id).await?;
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&found.name)
        .to_owned();

    ensure_references(
        &txn,
        payload.brand_id.flatten(),
        payload.category_id.flatten(),
    )
    .await?;

    let mut active: product::ActiveModel = found.into();
    if let Some(slug) = payload.slug.as_deref() {
        let slug = checked_slug(Some(slug), &name)?;
        ensure_slug_free(&txn, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    active.name = Set(name);
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(brand_id) = payload.brand_id {
        active.brand_id = Set(brand_id);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(gender) = payload.gender {
        active.gender = Set(gender);
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    if let Some(is_published) = payload.is_published {
        active.is_published = Set(is_published);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    if let Some(collection_ids) = &payload.collection_ids {
        set_collections(&txn, updated.id, collection_ids).await?;
    }

    let detail = product_detail(&txn, updated).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::OK, "Product updated", detail))
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_product(&txn, id).await?;

    let variant_ids: Vec<i32> = product_variant::Entity::find()
        .filter(product_variant::Column::ProductId.eq(found.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|variant| variant.id)
        .collect();
    delete_variants(&txn, &variant_ids).await?;

    product_image::Entity::delete_many()
        .filter(product_image::Column::ProductId.eq(found.id))
        .exec(&txn)
        .await?;
    product_collection::Entity::delete_many()
        .filter(product_collection::Column::ProductId.eq(found.id))
        .exec(&txn)
        .await?;
    ProductEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(product_id = id, variants = variant_ids.len(), "Product deleted");
    Ok(success(StatusCode::OK, "Product deleted"))
}

//STRUCTS
fn default_gender() -> Gender {
    Gender::Unisex
}

#[derive(Debug, Deserialize, Validate)]
struct CreateProduct {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    name: String,
    slug: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20000, message = "Description is too long"))]
    description: String,
    brand_id: Option<i32>,
    category_id: Option<i32>,
    #[serde(default = "default_gender")]
    gender: Gender,
    #[serde(default)]
    is_featured: bool,
    #[serde(default)]
    is_published: bool,
    collection_ids: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize, Validate)]
struct PatchProduct {
    #[serde(default, deserialize_with = "trimmed_option")]
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    name: Option<String>,
    slug: Option<String>,
    #[validate(length(max = 20000, message = "Description is too long"))]
    description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    brand_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    category_id: Option<Option<i32>>,
    gender: Option<Gender>,
    is_featured: Option<bool>,
    is_published: Option<bool>,
    collection_ids: Option<Vec<i32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_null_from_missing() {
        let patch: PatchProduct = serde_json::from_str(r#"{"brand_id": null}"#).unwrap();
        assert_eq!(patch.brand_id, Some(None));
        assert_eq!(patch.category_id, None);

        let patch: PatchProduct = serde_json::from_str(r#"{"category_id": 4}"#).unwrap();
        assert_eq!(patch.category_id, Some(Some(4)));
    }

    #[test]
    fn create_defaults_to_unpublished_unisex() {
        let create: CreateProduct = serde_json::from_str(r#"{"name": "Trail Runner"}"#).unwrap();
        assert_eq!(create.gender, Gender::Unisex);
        assert!(!create.is_published);
        assert!(create.description.is_empty());
    }
}
