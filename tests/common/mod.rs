#![allow(dead_code)]

use chrono::{Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tempfile::TempDir;

use storefront::config::AppConfig;
use storefront::entities::{
    attribute, attribute_value, brand, category, collection, product, product::Gender,
    product_collection, product_image, product_variant, variant_attribute_value,
};
use storefront::{app, prepare_database};

pub const ADMIN_EMAIL: &str = "admin@shop.test";
pub const ADMIN_PASSWORD: &str = "admin-password-1";
pub const USER_PASSWORD: &str = "customer-password";

pub struct TestApp {
    pub address: String,
    pub db: Arc<DatabaseConnection>,
    _dir: TempDir,
}

impl TestApp {
    /// Fresh SQLite file and server on an ephemeral port.
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("storefront.db");

        let config = AppConfig {
            database_url: format!("sqlite://{}?mode=rwc", path.display()),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            jwt_secret: "integration-test-secret-value".to_owned(),
            token_ttl_hours: 1,
            secure_cookies: false,
            admin_email: Some(ADMIN_EMAIL.to_owned()),
            admin_password: Some(ADMIN_PASSWORD.to_owned()),
        };

        let db = prepare_database(&config)
            .await
            .expect("Failed to prepare database");

        let listener = tokio::net::TcpListener::bind(config.socket_addr())
            .await
            .expect("Failed to bind test listener");
        let address = format!(
            "http://{}",
            listener.local_addr().expect("Listener has no address")
        );

        let router = app(db.clone(), Arc::new(config));
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("Test server stopped");
        });

        Self {
            address,
            db,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Client that keeps cookies between requests, like a browser.
pub fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

pub async fn body(response: Response) -> Value {
    response
        .json::<Value>()
        .await
        .expect("Failed to parse response JSON")
}

pub async fn login(client: &Client, app: &TestApp, email: &str, password: &str) -> String {
    let response = client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(response.status(), StatusCode::OK);

    body(response).await["token"]
        .as_str()
        .expect("Token not found in login response")
        .to_owned()
}

pub async fn admin_token(app: &TestApp) -> String {
    login(&Client::new(), app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

pub async fn register(client: &Client, app: &TestApp, email: &str) {
    let response = client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "email": email,
            "name": "Test Customer",
            "password": USER_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to send register request");
    assert_eq!(response.status(), StatusCode::CREATED);
}

pub async fn customer_token(app: &TestApp, email: &str) -> String {
    let client = Client::new();
    register(&client, app, email).await;
    login(&client, app, email, USER_PASSWORD).await
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Ids of the rows inserted by [`seed_catalog`].
pub struct Catalog {
    pub acme: i32,
    pub globex: i32,
    pub shoes: i32,
    pub shirts: i32,
    pub summer: i32,
    pub red: i32,
    pub blue: i32,
    pub small: i32,
    pub medium: i32,
    pub trail_runner: i32,
    pub trail_red_s: i32,
    pub trail_blue_m: i32,
    pub oxford: i32,
    pub oxford_red_m: i32,
    pub hidden: i32,
    pub hidden_red_s: i32,
    pub sock: i32,
    pub sock_blue_s: i32,
}

async fn insert_brand(db: &DatabaseConnection, name: &str, slug: &str) -> i32 {
    brand::ActiveModel {
        name: Set(name.to_owned()),
        slug: Set(slug.to_owned()),
        description: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert brand")
    .id
}

async fn insert_category(db: &DatabaseConnection, name: &str, slug: &str) -> i32 {
    category::ActiveModel {
        name: Set(name.to_owned()),
        slug: Set(slug.to_owned()),
        description: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert category")
    .id
}

async fn insert_attribute(db: &DatabaseConnection, name: &str, values: &[&str]) -> Vec<i32> {
    let attribute = attribute::ActiveModel {
        name: Set(name.to_owned()),
        display_name: Set(name.to_uppercase()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert attribute");

    let mut ids = Vec::new();
    for value in values {
        let value = attribute_value::ActiveModel {
            attribute_id: Set(attribute.id),
            value: Set(value.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert attribute value");
        ids.push(value.id);
    }
    ids
}

struct NewProduct<'a> {
    name: &'a str,
    slug: &'a str,
    brand_id: Option<i32>,
    category_id: Option<i32>,
    is_featured: bool,
    is_published: bool,
    age_minutes: i64,
}

async fn insert_product(db: &DatabaseConnection, new: NewProduct<'_>) -> i32 {
    let created_at = Utc::now() - Duration::minutes(new.age_minutes);
    product::ActiveModel {
        name: Set(new.name.to_owned()),
        slug: Set(new.slug.to_owned()),
        description: Set(format!("{} description", new.name)),
        brand_id: Set(new.brand_id),
        category_id: Set(new.category_id),
        gender: Set(Gender::Men),
        is_featured: Set(new.is_featured),
        is_published: Set(new.is_published),
        created_at: Set(created_at),
        updated_at: Set(created_at),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert product")
    .id
}

/// A published product with no variants, newer than everything in the seed.
pub async fn insert_bare_product(db: &DatabaseConnection, name: &str, slug: &str) -> i32 {
    insert_product(
        db,
        NewProduct {
            name,
            slug,
            brand_id: None,
            category_id: None,
            is_featured: false,
            is_published: true,
            age_minutes: 5,
        },
    )
    .await
}

async fn insert_variant(
    db: &DatabaseConnection,
    product_id: i32,
    sku: &str,
    price: f64,
    sale_price: Option<f64>,
    in_stock: bool,
    value_ids: &[i32],
) -> i32 {
    let variant = product_variant::ActiveModel {
        product_id: Set(product_id),
        sku: Set(sku.to_owned()),
        price: Set(price),
        sale_price: Set(sale_price),
        in_stock: Set(in_stock),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert variant");

    for value_id in value_ids {
        variant_attribute_value::Entity::insert(variant_attribute_value::ActiveModel {
            variant_id: Set(variant.id),
            attribute_value_id: Set(*value_id),
        })
        .exec_without_returning(db)
        .await
        .expect("Failed to tag variant");
    }
    variant.id
}

/// Three published products (Trail Runner, Oxford Shirt, Sold Out Sock) and
/// one unpublished draft.
pub async fn seed_catalog(db: &DatabaseConnection) -> Catalog {
    let acme = insert_brand(db, "Acme", "acme").await;
    let globex = insert_brand(db, "Globex", "globex").await;
    let shoes = insert_category(db, "Shoes", "shoes").await;
    let shirts = insert_category(db, "Shirts", "shirts").await;

    let colors = insert_attribute(db, "color", &["red", "blue"]).await;
    let sizes = insert_attribute(db, "size", &["s", "m"]).await;
    let (red, blue, small, medium) = (colors[0], colors[1], sizes[0], sizes[1]);

    let trail_runner = insert_product(
        db,
        NewProduct {
            name: "Trail Runner",
            slug: "trail-runner",
            brand_id: Some(acme),
            category_id: Some(shoes),
            is_featured: true,
            is_published: true,
            age_minutes: 30,
        },
    )
    .await;
    let trail_red_s =
        insert_variant(db, trail_runner, "TR-RED-S", 100.0, None, true, &[red, small]).await;
    let trail_blue_m = insert_variant(
        db,
        trail_runner,
        "TR-BLUE-M",
        120.0,
        Some(90.0),
        true,
        &[blue, medium],
    )
    .await;

    let oxford = insert_product(
        db,
        NewProduct {
            name: "Oxford Shirt",
            slug: "oxford-shirt",
            brand_id: Some(globex),
            category_id: Some(shirts),
            is_featured: false,
            is_published: true,
            age_minutes: 10,
        },
    )
    .await;
    let oxford_red_m =
        insert_variant(db, oxford, "OX-RED-M", 50.0, None, true, &[red, medium]).await;

    let hidden = insert_product(
        db,
        NewProduct {
            name: "Hidden Draft",
            slug: "hidden-draft",
            brand_id: Some(acme),
            category_id: Some(shoes),
            is_featured: false,
            is_published: false,
            age_minutes: 5,
        },
    )
    .await;
    let hidden_red_s =
        insert_variant(db, hidden, "HD-RED-S", 70.0, None, true, &[red, small]).await;

    let sock = insert_product(
        db,
        NewProduct {
            name: "Sold Out Sock",
            slug: "sold-out-sock",
            brand_id: Some(globex),
            category_id: None,
            is_featured: false,
            is_published: true,
            age_minutes: 20,
        },
    )
    .await;
    let sock_blue_s =
        insert_variant(db, sock, "SOS-BLUE-S", 10.0, None, false, &[blue, small]).await;

    let summer = collection::ActiveModel {
        name: Set("Summer".to_owned()),
        slug: Set("summer".to_owned()),
        description: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert collection")
    .id;
    product_collection::Entity::insert(product_collection::ActiveModel {
        product_id: Set(trail_runner),
        collection_id: Set(summer),
    })
    .exec_without_returning(db)
    .await
    .expect("Failed to add product to collection");

    for (url, is_primary, sort_order) in [
        ("https://media.shop.test/trail-side.jpg", false, 0),
        ("https://media.shop.test/trail-main.jpg", true, 1),
    ] {
        product_image::ActiveModel {
            product_id: Set(trail_runner),
            url: Set(url.to_owned()),
            alt_text: Set(None),
            is_primary: Set(is_primary),
            sort_order: Set(sort_order),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert image");
    }

    Catalog {
        acme,
        globex,
        shoes,
        shirts,
        summer,
        red,
        blue,
        small,
        medium,
        trail_runner,
        trail_red_s,
        trail_blue_m,
        oxford,
        oxford_red_m,
        hidden,
        hidden_red_s,
        sock,
        sock_blue_s,
    }
}
