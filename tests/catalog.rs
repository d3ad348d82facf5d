mod common;

use common::{body, insert_bare_product, seed_catalog, TestApp};
use reqwest::{Client, StatusCode};
use serde_json::Value;

async fn list(app: &TestApp, query: &str) -> Value {
    let response = Client::new()
        .get(app.url(&format!("/api/products{query}")))
        .send()
        .await
        .expect("Failed to send product list request");
    assert_eq!(response.status(), StatusCode::OK);
    body(response).await
}

fn slugs(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .expect("Items is not an array")
        .iter()
        .map(|item| item["slug"].as_str().unwrap_or_default().to_owned())
        .collect()
}

#[tokio::test]
async fn unfiltered_listing_returns_every_published_product() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;

    let page = list(&app, "").await;
    assert_eq!(page["total"], 3);
    let slugs = slugs(&page);
    assert!(!slugs.contains(&"hidden-draft".to_owned()));
    // Featured first.
    assert_eq!(slugs[0], "trail-runner");
}

#[tokio::test]
async fn brand_facet_narrows_the_listing() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;

    let page = list(&app, "?brand=acme").await;
    assert_eq!(slugs(&page), vec!["trail-runner"]);

    let page = list(&app, "?brand=acme,globex").await;
    assert_eq!(page["total"], 3);

    let page = list(&app, "?brand=unknown").await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn attribute_facets_combine_across_attributes() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;

    let mut blue = slugs(&list(&app, "?color=blue").await);
    blue.sort();
    assert_eq!(blue, vec!["sold-out-sock", "trail-runner"]);

    let page = list(&app, "?color=blue&size=m").await;
    assert_eq!(slugs(&page), vec!["trail-runner"]);

    let page = list(&app, "?color=red,blue").await;
    assert_eq!(page["total"], 3);
}

#[tokio::test]
async fn price_range_uses_the_sale_price() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;

    let page = list(&app, "?min_price=80&max_price=95").await;
    assert_eq!(slugs(&page), vec!["trail-runner"]);

    // Swapped bounds are normalised.
    let page = list(&app, "?min_price=95&max_price=80").await;
    assert_eq!(page["total"], 1);

    let card = &page["items"][0];
    assert_eq!(card["min_price"], 90.0);
    assert_eq!(card["max_price"], 100.0);
    assert_eq!(card["image"], "https://media.shop.test/trail-main.jpg");
}

#[tokio::test]
async fn price_sorts_order_by_lowest_price() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;

    let ascending = slugs(&list(&app, "?sort=price-asc").await);
    assert_eq!(ascending, vec!["sold-out-sock", "oxford-shirt", "trail-runner"]);

    let descending = slugs(&list(&app, "?sort=price-desc").await);
    assert_eq!(descending, vec!["trail-runner", "oxford-shirt", "sold-out-sock"]);

    let newest = slugs(&list(&app, "?sort=newest").await);
    assert_eq!(newest, vec!["oxford-shirt", "sold-out-sock", "trail-runner"]);
}

#[tokio::test]
async fn products_without_variants_sort_last_by_price() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;
    insert_bare_product(&app.db, "Gift Card", "gift-card").await;

    let ascending = slugs(&list(&app, "?sort=price-asc").await);
    assert_eq!(
        ascending,
        vec!["sold-out-sock", "oxford-shirt", "trail-runner", "gift-card"]
    );

    let descending = slugs(&list(&app, "?sort=price-desc").await);
    assert_eq!(
        descending,
        vec!["trail-runner", "oxford-shirt", "sold-out-sock", "gift-card"]
    );

    // Newest still puts it first.
    let newest = slugs(&list(&app, "?sort=newest").await);
    assert_eq!(newest[0], "gift-card");
}

#[tokio::test]
async fn search_wildcards_match_literally() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;
    insert_bare_product(&app.db, "50% Off Tee", "half-off-tee").await;

    let page = list(&app, "?q=%25").await;
    assert_eq!(page["total"], 1);
    assert_eq!(slugs(&page), vec!["half-off-tee"]);

    let page = list(&app, "?q=_").await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn search_and_pagination() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;

    let page = list(&app, "?q=Oxford").await;
    assert_eq!(slugs(&page), vec!["oxford-shirt"]);

    let page = list(&app, "?limit=1&page=2&sort=price-asc").await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(slugs(&page), vec!["oxford-shirt"]);

    let page = list(&app, "?limit=2&page=9").await;
    assert_eq!(page["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn product_detail_lists_variants_and_options() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;
    let client = Client::new();

    let response = client
        .get(app.url("/api/products/trail-runner"))
        .send()
        .await
        .expect("Failed to send product request");
    assert_eq!(response.status(), StatusCode::OK);

    let detail = body(response).await;
    assert_eq!(detail["brand"]["slug"], "acme");
    assert_eq!(detail["category"]["slug"], "shoes");
    assert_eq!(detail["collections"][0]["slug"], "summer");
    assert_eq!(detail["variants"].as_array().map(Vec::len), Some(2));
    assert_eq!(detail["options"]["color"], serde_json::json!(["blue", "red"]));
    assert_eq!(detail["min_price"], 90.0);

    let response = client
        .get(app.url("/api/products/hidden-draft"))
        .send()
        .await
        .expect("Failed to send product request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn variant_selection_resolves_one_variant() {
    let app = TestApp::spawn().await;
    let catalog = seed_catalog(&app.db).await;

    let response = Client::new()
        .get(app.url("/api/products/trail-runner/variant?color=blue&size=m"))
        .send()
        .await
        .expect("Failed to send variant request");
    assert_eq!(response.status(), StatusCode::OK);

    let resolved = body(response).await;
    assert_eq!(resolved["variant"]["id"], catalog.trail_blue_m);
    assert_eq!(resolved["variant"]["sku"], "TR-BLUE-M");
    assert_eq!(resolved["available"], true);

    let response = Client::new()
        .get(app.url("/api/products/trail-runner/variant?color=blue&size=s"))
        .send()
        .await
        .expect("Failed to send variant request");
    let resolved = body(response).await;
    assert!(resolved["variant"].is_null());
    assert_eq!(resolved["available"], false);
}

#[tokio::test]
async fn facets_and_collection_pages() {
    let app = TestApp::spawn().await;
    seed_catalog(&app.db).await;
    let client = Client::new();

    let facets = body(
        client
            .get(app.url("/api/products/facets"))
            .send()
            .await
            .expect("Failed to send facets request"),
    )
    .await;
    assert_eq!(facets["brands"].as_array().map(Vec::len), Some(2));
    let color = facets["attributes"]
        .as_array()
        .and_then(|attributes| attributes.iter().find(|a| a["name"] == "color"))
        .expect("Color facet missing");
    assert_eq!(color["values"].as_array().map(Vec::len), Some(2));

    let response = client
        .get(app.url("/api/collections/summer"))
        .send()
        .await
        .expect("Failed to send collection request");
    assert_eq!(response.status(), StatusCode::OK);
    let collection = body(response).await;
    assert_eq!(collection["collection"]["slug"], "summer");
    assert_eq!(slugs(&collection["products"]), vec!["trail-runner"]);

    let response = client
        .get(app.url("/api/collections/winter"))
        .send()
        .await
        .expect("Failed to send collection request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
