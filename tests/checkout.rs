mod common;

use common::{admin_token, bearer, body, customer_token, seed_catalog, TestApp};
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};

fn shipping_address() -> Value {
    json!({
        "full_name": "Dana Shopper",
        "line1": "1 Market Street",
        "city": "Springfield",
        "postal_code": "12345",
        "country": "US",
    })
}

async fn add(client: &Client, app: &TestApp, token: &str, variant_id: i32, quantity: i32) {
    let response = client
        .post(app.url("/api/cart/items"))
        .header(header::AUTHORIZATION, bearer(token))
        .json(&json!({ "variant_id": variant_id, "quantity": quantity }))
        .send()
        .await
        .expect("Failed to send add to cart request");
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn checkout_turns_the_cart_into_an_order() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let client = Client::new();
    let token = customer_token(&app, "buyer@shop.test").await;

    add(&client, &app, &token, catalog.trail_blue_m, 2).await;
    add(&client, &app, &token, catalog.oxford_red_m, 1).await;

    let response = client
        .post(app.url("/api/checkout"))
        .header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "address": shipping_address() }))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let order = body(response).await["data"].clone();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"], 230.0);
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));
    assert!(order["shipping_address"]
        .as_str()
        .is_some_and(|address| address.contains("Springfield")));
    let order_id = order["id"].as_i64().expect("Order id missing");

    let cart = body(
        client
            .get(app.url("/api/cart"))
            .header(header::AUTHORIZATION, bearer(&token))
            .send()
            .await
            .expect("Failed to send cart request"),
    )
    .await;
    assert_eq!(cart["item_count"], 0);

    let orders = body(
        client
            .get(app.url("/api/orders"))
            .header(header::AUTHORIZATION, bearer(&token))
            .send()
            .await
            .expect("Failed to send orders request"),
    )
    .await;
    assert_eq!(orders.as_array().map(Vec::len), Some(1));

    let response = client
        .get(app.url(&format!("/api/orders/{order_id}")))
        .header(header::AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("Failed to send order request");
    assert_eq!(response.status(), StatusCode::OK);

    // Other customers cannot see it.
    let stranger = customer_token(&app, "stranger@shop.test").await;
    let response = client
        .get(app.url(&format!("/api/orders/{order_id}")))
        .header(header::AUTHORIZATION, bearer(&stranger))
        .send()
        .await
        .expect("Failed to send order request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn saved_default_address_is_used_when_none_is_given() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let client = Client::new();
    let token = customer_token(&app, "repeat@shop.test").await;

    add(&client, &app, &token, catalog.oxford_red_m, 1).await;
    let response = client
        .post(app.url("/api/checkout"))
        .header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = client
        .post(app.url("/api/addresses"))
        .header(header::AUTHORIZATION, bearer(&token))
        .json(&shipping_address())
        .send()
        .await
        .expect("Failed to send address request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(app.url("/api/checkout"))
        .header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body(response).await["data"]["total"], 50.0);
}

#[tokio::test]
async fn empty_cart_cannot_be_checked_out() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;
    let token = customer_token(&app, "empty@shop.test").await;

    let response = Client::new()
        .post(app.url("/api/checkout"))
        .header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "address": shipping_address() }))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "Your cart is empty");
}

#[tokio::test]
async fn lines_that_went_out_of_stock_block_checkout() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;
    let client = Client::new();
    let token = customer_token(&app, "late@shop.test").await;
    add(&client, &app, &token, catalog.trail_red_s, 1).await;

    let admin = admin_token(&app).await;
    let response = client
        .patch(app.url(&format!("/api/admin/variants/{}", catalog.trail_red_s)))
        .header(header::AUTHORIZATION, bearer(&admin))
        .json(&json!({ "in_stock": false }))
        .send()
        .await
        .expect("Failed to send variant patch request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(app.url("/api/checkout"))
        .header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "address": shipping_address() }))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(app.url("/api/checkout"))
        .json(&json!({ "address": shipping_address() }))
        .send()
        .await
        .expect("Failed to send checkout request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
