use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{get, patch},
    Router,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    Order, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::api::extract::{Json, Path, Query};
use crate::entities::{
    address, cart, hash_password, order,
    user::{self, Entity as UserEntity, Role},
};
use crate::middleware::{
    auth::Claims,
    logging::{json_ok, success, success_with, ApiError},
};
use crate::services::{
    cart::clear as clear_cart, catalog::contains_literal, validation::validate_payload,
};

//ROUTERS
pub fn admin_user_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/:id", patch(patch_user).delete(delete_user))
        .layer(Extension(db))
}

//ROUTES
async fn get_users(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Query(query): Query<UsersQuery>,
) -> Result<Response, ApiError> {
    let direction = match query.order.as_deref() {
        Some("desc") => Order::Desc,
        _ => Order::Asc,
    };
    let sort_users = match query.sort_by.as_deref() {
        Some("email") => user::Column::Email,
        Some("name") => user::Column::Name,
        Some("role") => user::Column::Role,
        Some("created_at") => user::Column::CreatedAt,
        _ => user::Column::Id,
    };

    let mut user_finder = UserEntity::find();

    if let Some(role) = query.role.as_deref().filter(|r| !r.is_empty()) {
        let role: Role = role.parse().map_err(ApiError::ValidationFail)?;
        user_finder = user_finder.filter(user::Column::Role.eq(role.as_str()));
    }

    if let Some(search) = query.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let mut condition = Condition::any()
            .add(contains_literal(user::Column::Email, search))
            .add(contains_literal(user::Column::Name, search));
        if let Ok(id) = search.parse::<i32>() {
            condition = condition.add(user::Column::Id.eq(id));
        }
        user_finder = user_finder.filter(condition);
    }

    let txn = db.begin().await?;
    let users = user_finder
        .order_by(sort_users, direction)
        .order_by_asc(user::Column::Id)
        .all(&txn)
        .await?;
    txn.commit().await?;

    Ok(json_ok(users))
}

async fn patch_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PatchUser>,
) -> Result<Response, ApiError> {
    validate_payload(&payload)?;

    let txn = db.begin().await?;
    let found = UserEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with {id} id was found")))?;

    let mut active: user::ActiveModel = found.into();

    if let Some(role) = payload.role {
        if id == claims.user_id && role != Role::Admin {
            return Err(ApiError::BadRequest(
                "You cannot remove your own admin role".to_owned(),
            ));
        }
        active.role = Set(role);
    }
    if let Some(name) = payload.name.as_deref().map(str::trim) {
        active.name = Set(name.to_owned());
    }
    if let Some(password) = payload.password.as_deref() {
        let hashed = hash_password(password)
            .map_err(|err| ApiError::PasswordHashFailed(err.to_string()))?;
        active.password = Set(hashed);
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(user_id = id, role = updated.role.as_str(), "User updated");
    Ok(success_with(StatusCode::OK, "User updated", updated))
}

async fn delete_user(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    if id == claims.user_id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_owned(),
        ));
    }

    let txn = db.begin().await?;
    let found = UserEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with {id} id was found")))?;

    if let Some(user_cart) = cart::Entity::find()
        .filter(cart::Column::UserId.eq(found.id))
        .one(&txn)
        .await?
    {
        clear_cart(&txn, &user_cart).await?;
        cart::Entity::delete_by_id(user_cart.id).exec(&txn).await?;
    }
    address::Entity::delete_many()
        .filter(address::Column::UserId.eq(found.id))
        .exec(&txn)
        .await?;
    // Orders keep their history without the account link.
    order::Entity::update_many()
        .col_expr(order::Column::UserId, Expr::value(Option::<i32>::None))
        .filter(order::Column::UserId.eq(found.id))
        .exec(&txn)
        .await?;
    UserEntity::delete_by_id(found.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(user_id = id, "User deleted");
    Ok(success(StatusCode::OK, "User deleted"))
}

//STRUCTS
#[derive(Deserialize)]
struct UsersQuery {
    query: Option<String>,
    role: Option<String>,
    sort_by: Option<String>,
    order: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct PatchUser {
    role: Option<Role>,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    name: Option<String>,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    password: Option<String>,
}
