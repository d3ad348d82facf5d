mod common;

use common::{bearer, body, browser, login, register, TestApp, USER_PASSWORD};
use reqwest::{header, Client, StatusCode};
use serde_json::json;

#[tokio::test]
async fn register_creates_a_customer_account() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "email": "  New.Customer@Shop.test ",
            "name": "New Customer",
            "password": USER_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = body(response).await;
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["email"], "new.customer@shop.test");
    assert_eq!(created["data"]["role"], "user");
    assert!(created["data"].get("password").is_none());
}

#[tokio::test]
async fn duplicate_and_invalid_registrations_are_rejected() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    register(&client, &app, "taken@shop.test").await;

    let response = client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "email": "TAKEN@shop.test",
            "name": "Someone Else",
            "password": USER_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body(response).await["error"],
        "An account with this email already exists"
    );

    let response = client
        .post(app.url("/api/auth/register"))
        .json(&json!({
            "email": "short@shop.test",
            "name": "Short",
            "password": "short",
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body(response).await["error"],
        "Password must be at least 8 characters"
    );
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    register(&client, &app, "careful@shop.test").await;

    for (email, password) in [
        ("careful@shop.test", "not-the-password"),
        ("nobody@shop.test", USER_PASSWORD),
    ] {
        let response = client
            .post(app.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(response).await["error"], "Invalid email or password");
    }
}

#[tokio::test]
async fn profile_requires_a_valid_token() {
    let app = TestApp::spawn().await;
    let client = Client::new();
    register(&client, &app, "profile@shop.test").await;
    let token = login(&client, &app, "profile@shop.test", USER_PASSWORD).await;

    let response = client
        .get(app.url("/api/profile"))
        .header(header::AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["email"], "profile@shop.test");

    let response = client
        .patch(app.url("/api/profile"))
        .header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Renamed" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["data"]["name"], "Renamed");

    let response = client
        .get(app.url("/api/profile"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(app.url("/api/profile"))
        .header(header::AUTHORIZATION, bearer("not.a.token"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_session_ends_on_logout() {
    let app = TestApp::spawn().await;
    let client = browser();
    register(&client, &app, "cookie@shop.test").await;
    login(&client, &app, "cookie@shop.test", USER_PASSWORD).await;

    let response = client
        .get(app.url("/api/profile"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(app.url("/api/auth/logout"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(app.url("/api/profile"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
