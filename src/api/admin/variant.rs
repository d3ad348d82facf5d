use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{patch, post},
    Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use validator::Validate;

use super::{double_option, trimmed, trimmed_option};
use super::product::{delete_variants, find_product, touch_product};
use crate::api::extract::{Json, Path};
use crate::entities::{attribute, attribute_value, product_variant, variant_attribute_value};
use crate::middleware::logging::{success, success_with, ApiError};
use crate::services::{catalog::variant_views, validation::validate_payload};

//ROUTERS
pub fn admin_variant_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products/:id/variants", post(create_variant))
        .route("/variants/:id", patch(patch_variant).delete(delete_variant))
        .layer(Extension(db))
}

fn check_sale_price(price: f64, sale_price: Option<f64>) -> Result<(), ApiError> {
    match sale_price {
        Some(sale) if sale < 0.0 => Err(ApiError::ValidationFail(
            "Sale price cannot be negative".to_owned(),
        )),
        Some(sale) if sale >= price => Err(ApiError::ValidationFail(
            "Sale price must be lower than the price".to_owned(),
        )),
        _ => Ok(()),
    }
}

/// attribute name -> value for the given value ids, rejecting unknown ids and
/// two values of the same attribute.
async fn resolve_selection<C: ConnectionTrait>(
    conn: &C,
    value_ids: &[i32],
) -> Result<(BTreeSet<i32>, BTreeMap<String, String>), ApiError> {
    let ids: BTreeSet<i32> = value_ids.iter().copied().collect();
    if ids.is_empty() {
        return Ok((ids, BTreeMap::new()));
    }

    let rows = attribute_value::Entity::find()
        .filter(attribute_value::Column::Id.is_in(ids.iter().copied()))
        .find_also_related(attribute::Entity)
        .all(conn)
        .await?;
    if rows.len() != ids.len() {
        return Err(ApiError::BadRequest(
            "One or more attribute values do not exist".to_owned(),
        ));
    }

    let mut selection = BTreeMap::new();
    for (value, attribute) in rows {
        let Some(attribute) = attribute else {
            return Err(ApiError::BadRequest(format!(
                "Attribute value {} has no attribute",
                value.id
            )));
        };
        if selection.insert(attribute.name.clone(), value.value).is_some() {
            return Err(ApiError::BadRequest(format!(
                "A variant can only have one {} value",
                attribute.display_name
            )));
        }
    }
    Ok((ids, selection))
}

async fn ensure_sku_free<C: ConnectionTrait>(
    conn: &C,
    sku: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query =
        product_variant::Entity::find().filter(product_variant::Column::Sku.eq(sku));
    if let Some(id) = except {
        query = query.filter(product_variant::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ApiError::Conflict(
            "A variant with this SKU already exists".to_owned(),
        ));
    }
    Ok(())
}

async fn find_variant<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<product_variant::Model, ApiError> {
    product_variant::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No variant with {id} id was found")))
}

//ROUTES
async fn create_variant(
    Path(product_id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateVariant>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;
    check_sale_price(payload.price, payload.sale_price)?;
    let sku = payload.sku.trim().to_owned();

    let txn = db.begin().await?;
    let found = find_product(&txn, product_id).await?;
    ensure_sku_free(&txn, &sku, None).await?;

    let (value_ids, selection) = resolve_selection(&txn, &payload.attribute_value_ids).await?;
    let siblings = variant_views(&txn, found.id).await?;
    if siblings.iter().any(|variant| variant.attributes == selection) {
        return Err(ApiError::Conflict(
            "A variant with these attributes already exists".to_owned(),
        ));
    }

    let created = product_variant::ActiveModel {
        product_id: Set(found.id),
        sku: Set(sku),
        price: Set(payload.price),
        sale_price: Set(payload.sale_price),
        in_stock: Set(payload.in_stock),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if !value_ids.is_empty() {
        variant_attribute_value::Entity::insert_many(value_ids.into_iter().map(|value_id| {
            variant_attribute_value::ActiveModel {
                variant_id: Set(created.id),
                attribute_value_id: Set(value_id),
            }
        }))
        .exec_without_returning(&txn)
        .await?;
    }
    touch_product(&txn, found.id).await?;

    let view = variant_views(&txn, found.id)
        .await?
        .into_iter()
        .find(|variant| variant.id == created.id);
    txn.commit().await?;

    tracing::info!(variant_id = created.id, product_id = found.id, "Variant created");
    Ok(success_with(StatusCode::CREATED, "Variant created", view))
}

async fn patch_variant(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchVariant>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let found = find_variant(&txn, id).await?;

    let price = payload.price.unwrap_or(found.price);
    let sale_price = payload.sale_price.unwrap_or(found.sale_price);
    check_sale_price(price, sale_price)?;

    let product_id = found.product_id;
    let mut active: product_variant::ActiveModel = found.into();
    if let Some(sku) = payload.sku.as_deref().map(str::trim) {
        ensure_sku_free(&txn, sku, Some(id)).await?;
        active.sku = Set(sku.to_owned());
    }
    if let Some(in_stock) = payload.in_stock {
        active.in_stock = Set(in_stock);
    }
    active.price = Set(price);
    active.sale_price = Set(sale_price);
    let updated = active.update(&txn).await?;
    touch_product(&txn, product_id).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::OK, "Variant updated", updated))
}

async fn delete_variant(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_variant(&txn, id).await?;
    delete_variants(&txn, &[found.id]).await?;
    touch_product(&txn, found.product_id).await?;
    txn.commit().await?;

    Ok(success(StatusCode::OK, "Variant deleted"))
}

//STRUCTS
fn default_in_stock() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
struct CreateVariant {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    sku: String,
    #[validate(range(min = 0.01, message = "Price must be greater than zero"))]
    price: f64,
    sale_price: Option<f64>,
    #[serde(default = "default_in_stock")]
    in_stock: bool,
    #[serde(default)]
    attribute_value_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, Validate)]
struct PatchVariant {
    #[serde(default, deserialize_with = "trimmed_option")]
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    sku: Option<String>,
    #[validate(range(min = 0.01, message = "Price must be greater than zero"))]
    price: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    sale_price: Option<Option<f64>>,
    in_stock: Option<bool>,
}
