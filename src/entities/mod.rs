pub mod address;
pub mod attribute;
pub mod attribute_value;
pub mod brand;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod collection;
pub mod guest;
pub mod newsletter_subscriber;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_collection;
pub mod product_image;
pub mod product_variant;
pub mod user;
pub mod variant_attribute_value;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Index, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Schema, Set,
};

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Creates every table from the entity definitions. Safe to run on each start.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    // Parents before children so the foreign keys resolve on strict backends.
    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, address::Entity).await?;
    create_table(db, &schema, brand::Entity).await?;
    create_table(db, &schema, category::Entity).await?;
    create_table(db, &schema, collection::Entity).await?;
    create_table(db, &schema, product::Entity).await?;
    create_table(db, &schema, product_collection::Entity).await?;
    create_table(db, &schema, product_variant::Entity).await?;
    create_table(db, &schema, attribute::Entity).await?;
    create_table(db, &schema, attribute_value::Entity).await?;
    create_table(db, &schema, variant_attribute_value::Entity).await?;
    create_table(db, &schema, product_image::Entity).await?;
    create_table(db, &schema, guest::Entity).await?;
    create_table(db, &schema, cart::Entity).await?;
    create_table(db, &schema, cart_item::Entity).await?;
    create_table(db, &schema, order::Entity).await?;
    create_table(db, &schema, order_item::Entity).await?;
    create_table(db, &schema, newsletter_subscriber::Entity).await?;

    let backend = db.get_database_backend();
    let unique_indexes = [
        Index::create()
            .name("ux_cart_item_cart_variant")
            .table(cart_item::Entity)
            .col(cart_item::Column::CartId)
            .col(cart_item::Column::VariantId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_attribute_value_attribute_value")
            .table(attribute_value::Entity)
            .col(attribute_value::Column::AttributeId)
            .col(attribute_value::Column::Value)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];
    for index in unique_indexes {
        db.execute(backend.build(&index)).await?;
    }

    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Creates the configured admin account when it does not exist yet.
pub async fn seed_admin(db: &DatabaseConnection, email: &str, password: &str) -> Result<(), DbErr> {
    let email = email.trim().to_lowercase();
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        tracing::debug!(email = %email, "Admin account already present");
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|err| DbErr::Custom(format!("Failed to hash password: {err}")))?;

    let new_admin = user::ActiveModel {
        email: Set(email.clone()),
        name: Set("Administrator".to_owned()),
        password: Set(password_hash),
        role: Set(user::Role::Admin),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    user::Entity::insert(new_admin).exec(db).await?;
    tracing::info!(email = %email, "Seeded admin account");

    Ok(())
}
