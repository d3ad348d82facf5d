use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::trimmed;
use crate::api::extract::{Json, Path};
use crate::entities::{attribute, attribute_value, variant_attribute_value};
use crate::middleware::logging::{json_ok, success, success_with, ApiError};
use crate::services::{filter::is_reserved_key, slug::is_valid_slug, validation::validate_payload};

//ROUTERS
pub fn admin_attribute_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/attributes", get(get_attributes).post(create_attribute))
        .route(
            "/attributes/:id",
            get(get_attribute)
                .patch(patch_attribute)
                .delete(delete_attribute),
        )
        .route("/attributes/:id/values", post(create_value))
        .route("/attribute-values/:id", delete(delete_value))
        .layer(Extension(db))
}

#[derive(Debug, Serialize)]
struct AttributeResponse {
    #[serde(flatten)]
    attribute: attribute::Model,
    values: Vec<attribute_value::Model>,
}

async fn find_attribute<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<attribute::Model, ApiError> {
    attribute::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No attribute with {id} id was found")))
}

/// Variants tagged with any value of the attribute.
async fn variants_using_attribute<C: ConnectionTrait>(conn: &C, id: i32) -> Result<u64, DbErr> {
    variant_attribute_value::Entity::find()
        .join(
            JoinType::InnerJoin,
            variant_attribute_value::Relation::AttributeValue.def(),
        )
        .filter(attribute_value::Column::AttributeId.eq(id))
        .count(conn)
        .await
}

async fn variants_using_value<C: ConnectionTrait>(conn: &C, id: i32) -> Result<u64, DbErr> {
    variant_attribute_value::Entity::find()
        .filter(variant_attribute_value::Column::AttributeValueId.eq(id))
        .count(conn)
        .await
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

//ROUTES
async fn get_attributes(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let attributes: Vec<AttributeResponse> = attribute::Entity::find()
        .order_by_asc(attribute::Column::Name)
        .find_with_related(attribute_value::Entity)
        .all(&txn)
        .await?
        .into_iter()
        .map(|(attribute, values)| AttributeResponse { attribute, values })
        .collect();
    txn.commit().await?;

    Ok(json_ok(attributes))
}

async fn get_attribute(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_attribute(&txn, id).await?;
    let values = attribute_value::Entity::find()
        .filter(attribute_value::Column::AttributeId.eq(found.id))
        .order_by_asc(attribute_value::Column::Value)
        .all(&txn)
        .await?;
    txn.commit().await?;

    Ok(json_ok(AttributeResponse {
        attribute: found,
        values,
    }))
}

async fn create_attribute(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateAttribute>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;
    let name = normalize_key(&payload.name);
    if !is_valid_slug(&name) {
        return Err(ApiError::ValidationFail(
            "Attribute name may only contain lowercase letters, numbers and single hyphens"
                .to_owned(),
        ));
    }
    if is_reserved_key(&name) {
        return Err(ApiError::ValidationFail(format!(
            "{name} is reserved and cannot be used as an attribute name"
        )));
    }

    let txn = db.begin().await?;
    let existing = attribute::Entity::find()
        .filter(attribute::Column::Name.eq(name.as_str()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "An attribute with this name already exists".to_owned(),
        ));
    }

    let created = attribute::ActiveModel {
        name: Set(name),
        display_name: Set(payload.display_name.trim().to_owned()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::CREATED, "Attribute created", created))
}

async fn patch_attribute(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<PatchAttribute>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let mut active: attribute::ActiveModel = find_attribute(&txn, id).await?.into();
    active.display_name = Set(payload.display_name.trim().to_owned());
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::OK, "Attribute updated", updated))
}

async fn delete_attribute(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = find_attribute(&txn, id).await?;

    let in_use = variants_using_attribute(&txn, found.id).await?;
    if in_use > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete attribute: {in_use} variant(s) still use it"
        )));
    }

    attribute_value::Entity::delete_many()
        .filter(attribute_value::Column::AttributeId.eq(found.id))
        .exec(&txn)
        .await?;
    attribute::Entity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(success(StatusCode::OK, "Attribute deleted"))
}

async fn create_value(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<CreateValue>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;
    // Stored lowercase so it matches normalized filter values.
    let value = normalize_key(&payload.value);
    if value.contains(',') {
        return Err(ApiError::ValidationFail(
            "Attribute values cannot contain commas".to_owned(),
        ));
    }

    let txn = db.begin().await?;
    let found = find_attribute(&txn, id).await?;
    let existing = attribute_value::Entity::find()
        .filter(attribute_value::Column::AttributeId.eq(found.id))
        .filter(attribute_value::Column::Value.eq(value.as_str()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(format!(
            "{} already has the value {value}",
            found.display_name
        )));
    }

    let created = attribute_value::ActiveModel {
        attribute_id: Set(found.id),
        value: Set(value),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    Ok(success_with(StatusCode::CREATED, "Value added", created))
}

async fn delete_value(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Response, ApiError> {
    let txn = db.begin().await?;
    let found = attribute_value::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No attribute value with {id} id was found")))?;

    let in_use = variants_using_value(&txn, found.id).await?;
    if in_use > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete value: {in_use} variant(s) still use it"
        )));
    }

    attribute_value::Entity::delete_by_id(found.id)
        .exec(&txn)
        .await?;
    txn.commit().await?;

    Ok(success(StatusCode::OK, "Value deleted"))
}

//STRUCTS
#[derive(Debug, Deserialize, Validate)]
struct CreateAttribute {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 50, message = "Name is required"))]
    name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    display_name: String,
}

#[derive(Debug, Deserialize, Validate)]
struct PatchAttribute {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    display_name: String,
}

#[derive(Debug, Deserialize, Validate)]
struct CreateValue {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 50, message = "Value is required"))]
    value: String,
}
