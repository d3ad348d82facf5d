mod common;

use common::{admin_token, bearer, body, customer_token, seed_catalog, TestApp};
use reqwest::{header, Client, Method, Response, StatusCode};
use serde_json::{json, Value};

struct Admin {
    client: Client,
    token: String,
}

impl Admin {
    async fn new(app: &TestApp) -> Self {
        Self {
            client: Client::new(),
            token: admin_token(app).await,
        }
    }

    async fn send(
        &self,
        app: &TestApp,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Response {
        let mut request = self
            .client
            .request(method, app.url(&format!("/api/admin{path}")))
            .header(header::AUTHORIZATION, bearer(&self.token));
        if let Some(payload) = payload {
            request = request.json(&payload);
        }
        request.send().await.expect("Failed to send admin request")
    }

    async fn post(&self, app: &TestApp, path: &str, payload: Value) -> Response {
        self.send(app, Method::POST, path, Some(payload)).await
    }

    async fn patch(&self, app: &TestApp, path: &str, payload: Value) -> Response {
        self.send(app, Method::PATCH, path, Some(payload)).await
    }

    async fn delete(&self, app: &TestApp, path: &str) -> Response {
        self.send(app, Method::DELETE, path, None).await
    }

    async fn get(&self, app: &TestApp, path: &str) -> Response {
        self.send(app, Method::GET, path, None).await
    }
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(app.url("/api/admin/brands"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let customer = customer_token(&app, "curious@shop.test").await;
    let response = client
        .get(app.url("/api/admin/brands"))
        .header(header::AUTHORIZATION, bearer(&customer))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn taxonomy_slugs_are_unique_and_well_formed() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;
    let admin = Admin::new(&app).await;

    // Derived from the name.
    let response = admin.post(&app, "/brands", json!({ "name": "ACME" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body(response).await["error"],
        "A brand with this slug already exists"
    );

    let response = admin
        .post(&app, "/categories", json!({ "name": "Boots", "slug": "Not A Slug!" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = admin
        .post(&app, "/categories", json!({ "name": "Winter Boots" }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body(response).await;
    assert_eq!(created["data"]["slug"], "winter-boots");

    let response = admin
        .patch(
            &app,
            &format!("/categories/{}", created["data"]["id"]),
            json!({ "slug": "shoes" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn referenced_taxonomy_cannot_be_deleted() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let admin = Admin::new(&app).await;

    // The unpublished draft counts too.
    let response = admin.delete(&app, &format!("/brands/{}", catalog.acme)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body(response).await["error"],
        "Cannot delete brand: 2 product(s) still use it"
    );

    let response = admin
        .delete(&app, &format!("/categories/{}", catalog.shirts))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body(response).await["error"],
        "Cannot delete category: 1 product(s) still use it"
    );

    let response = admin.post(&app, "/brands", json!({ "name": "Initech" })).await;
    let unused = body(response).await["data"]["id"].clone();
    let response = admin.delete(&app, &format!("/brands/{unused}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["success"], true);

    let response = admin.get(&app, &format!("/brands/{unused}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn collections_are_freed_by_removing_products() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let admin = Admin::new(&app).await;
    let summer = format!("/collections/{}", catalog.summer);

    let response = admin.delete(&app, &summer).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body(response).await["error"],
        "Cannot delete collection: 1 product(s) still use it"
    );

    let response = admin
        .post(&app, &format!("{summer}/products"), json!({ "product_id": catalog.trail_runner }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = admin
        .delete(&app, &format!("{summer}/products/{}", catalog.trail_runner))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = admin.delete(&app, &summer).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn attributes_in_use_are_protected() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let admin = Admin::new(&app).await;

    let response = admin
        .post(&app, "/attributes", json!({ "name": "q", "display_name": "Query" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = admin
        .post(&app, "/attributes", json!({ "name": "material", "display_name": "Material" }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let material = body(response).await["data"]["id"].clone();

    let response = admin
        .post(&app, &format!("/attributes/{material}/values"), json!({ "value": "Cotton" }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = admin.delete(&app, &format!("/attribute-values/{}", catalog.red)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = admin.delete(&app, &format!("/attributes/{material}")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn products_and_variants_are_managed_together() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let admin = Admin::new(&app).await;

    let response = admin
        .post(
            &app,
            "/products",
            json!({
                "name": "Court Classic",
                "brand_id": catalog.acme,
                "category_id": catalog.shoes,
                "is_published": true,
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product = body(response).await["data"].clone();
    assert_eq!(product["slug"], "court-classic");
    let variants = format!("/products/{}/variants", product["id"]);

    let response = admin
        .post(
            &app,
            &variants,
            json!({
                "sku": "CC-RED-S",
                "price": 80.0,
                "attribute_value_ids": [catalog.red, catalog.small],
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = admin
        .post(&app, &variants, json!({ "sku": "CC-RED-S", "price": 80.0 }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = admin
        .post(
            &app,
            &variants,
            json!({
                "sku": "CC-MIXED",
                "price": 80.0,
                "attribute_value_ids": [catalog.red, catalog.blue],
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = admin
        .post(
            &app,
            &variants,
            json!({ "sku": "CC-SALE", "price": 80.0, "sale_price": 80.0 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let listing = body(
        Client::new()
            .get(app.url("/api/products?brand=acme&sort=price-asc"))
            .send()
            .await
            .expect("Failed to send request"),
    )
    .await;
    assert_eq!(listing["total"], 2);
    assert_eq!(listing["items"][0]["slug"], "court-classic");

    let response = admin
        .post(&app, "/products", json!({ "name": "Missing Brand", "brand_id": 9999 }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = admin
        .delete(&app, &format!("/products/{}", catalog.hidden))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = admin.delete(&app, &format!("/brands/{}", catalog.acme)).await;
    assert_eq!(
        body(response).await["error"],
        "Cannot delete brand: 2 product(s) still use it"
    );
}

#[tokio::test]
async fn order_status_follows_the_lifecycle() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let admin = Admin::new(&app).await;
    let client = Client::new();

    let customer = customer_token(&app, "orders@shop.test").await;
    client
        .post(app.url("/api/cart/items"))
        .header(header::AUTHORIZATION, bearer(&customer))
        .json(&json!({ "variant_id": catalog.oxford_red_m, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    let response = client
        .post(app.url("/api/checkout"))
        .header(header::AUTHORIZATION, bearer(&customer))
        .json(&json!({
            "address": {
                "full_name": "Order Tester",
                "line1": "2 Depot Road",
                "city": "Shelbyville",
                "postal_code": "54321",
                "country": "US",
            }
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id = body(response).await["data"]["id"].clone();
    let path = format!("/orders/{order_id}");

    let listing = body(admin.get(&app, "/orders?status=pending").await).await;
    assert_eq!(listing["total"], 1);

    let response = admin.patch(&app, &path, json!({ "status": "shipped" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body(response).await["error"],
        "Cannot change order status from pending to shipped"
    );

    let response = admin.patch(&app, &path, json!({ "status": "processing" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["data"]["status"], "processing");

    let response = admin.delete(&app, &path).await;
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = body(response).await;
    assert_eq!(deleted["success"], true);
    assert_eq!(deleted["message"], format!("Order {order_id} deleted"));

    let response = admin.get(&app, &path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_cannot_lock_themselves_out() {
    let app = TestApp::spawn().await;
    let admin = Admin::new(&app).await;

    let users = body(admin.get(&app, "/users?role=admin").await).await;
    let admin_id = users[0]["id"].clone();

    let response = admin
        .patch(&app, &format!("/users/{admin_id}"), json!({ "role": "user" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = admin.delete(&app, &format!("/users/{admin_id}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    customer_token(&app, "leaving@shop.test").await;
    let users = body(admin.get(&app, "/users?query=leaving").await).await;
    let customer_id = users[0]["id"].clone();
    let response = admin.delete(&app, &format!("/users/{customer_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unparsable_ids_and_queries_get_the_error_envelope() {
    let app = TestApp::spawn().await;
    let admin = Admin::new(&app).await;

    let response = admin.delete(&app, "/orders/abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let rejected = body(response).await;
    assert_eq!(rejected["success"], false);
    assert!(rejected["error"]
        .as_str()
        .is_some_and(|error| error.contains("abc")));

    let response = admin.get(&app, "/orders?page=x").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let rejected = body(response).await;
    assert_eq!(rejected["success"], false);
    assert!(rejected["error"].is_string());
}

#[tokio::test]
async fn blank_names_and_skus_are_rejected() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let admin = Admin::new(&app).await;

    let response = admin.post(&app, "/brands", json!({ "name": "   " })).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body(response).await["error"], "Name is required");

    let response = admin
        .patch(&app, &format!("/categories/{}", catalog.shoes), json!({ "name": " \t " }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let variants = format!("/products/{}/variants", catalog.oxford);
    let response = admin
        .post(&app, &variants, json!({ "sku": "  ", "price": 20.0 }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body(response).await["error"], "SKU is required");

    let response = admin
        .post(&app, "/attributes", json!({ "name": "fit", "display_name": "  " }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let response = admin
        .post(&app, "/attributes", json!({ "name": "fit", "display_name": "Fit" }))
        .await;
    let fit = body(response).await["data"]["id"].clone();
    let response = admin
        .post(&app, &format!("/attributes/{fit}/values"), json!({ "value": " " }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Surrounding whitespace is dropped from what is stored.
    let response = admin.post(&app, "/brands", json!({ "name": "  Initech  " })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body(response).await["data"]["name"], "Initech");
}
