mod common;

use axum::http::{header, Method, StatusCode};
use common::TestRouter;
use serde_json::json;
use survey_service::middleware::{ROLE_HEADER, USER_ID_HEADER};
use survey_service::models::PRODUCTS_COLLECTION;
use survey_service::services::DocumentStore;

#[tokio::test]
async fn home_page_is_ok() {
    let app = TestRouter::new().await;

    let response = app.get("/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().contains("Welcome to the Shop!"));
    assert!(response.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn creating_a_product_returns_201_with_id() {
    let app = TestRouter::new().await;

    let response = app
        .json(
            Method::POST,
            "/api/product",
            &json!({ "name": "Tablet", "price": 300 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["message"], "Product created");
    let id = body["id"].as_str().expect("id should be a string");

    let fetched = app.get(&format!("/product/{}", id)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let product = fetched.json();
    assert_eq!(product["name"], "Tablet");
    assert_eq!(product["price"], 300.0);
}

#[tokio::test]
async fn invalid_product_body_is_400() {
    let app = TestRouter::new().await;

    let negative = app
        .json(
            Method::POST,
            "/api/product",
            &json!({ "name": "Tablet", "price": -1 }),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let missing = app
        .json(Method::POST, "/api/product", &json!({ "name": "Tablet" }))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert!(missing.json()["error"].is_string());
}

#[tokio::test]
async fn blank_product_name_is_400_and_not_stored() {
    let app = TestRouter::new().await;

    let response = app
        .json(
            Method::POST,
            "/api/product",
            &json!({ "name": "   ", "price": 1 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "Validation error");

    let products = app
        .store
        .find(PRODUCTS_COLLECTION, None, None)
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn product_name_is_stored_trimmed() {
    let app = TestRouter::new().await;

    let created = app
        .json(
            Method::POST,
            "/api/product",
            &json!({ "name": "  Tablet ", "price": 300 }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let id = created.json()["id"].as_str().unwrap().to_string();
    let product = app.get(&format!("/product/{}", id)).await.json();
    assert_eq!(product["name"], "Tablet");
}

#[tokio::test]
async fn seeded_product_is_served() {
    let app = TestRouter::new().await;

    let response = app.get("/product/1").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["name"], "Laptop");
}

#[tokio::test]
async fn missing_product_is_404_with_error_body() {
    let app = TestRouter::new().await;

    let response = app.get("/product/99").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.json()["error"]
        .as_str()
        .unwrap()
        .contains("does not exist"));
}

#[tokio::test]
async fn old_shop_redirects_with_302() {
    let app = TestRouter::new().await;

    let response = app.get("/old-shop").await;

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(response.headers[header::LOCATION], "/");
}

#[tokio::test]
async fn search_without_query_is_400() {
    let app = TestRouter::new().await;

    assert_eq!(app.get("/search").await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/search?q=").await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_matches_product_names() {
    let app = TestRouter::new().await;

    let response = app.get("/search?q=Phone").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["query"], "Phone");
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["id"], "2");
}

#[tokio::test]
async fn dashboard_requires_login() {
    let app = TestRouter::new().await;

    let anonymous = app.get("/dashboard").await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert!(anonymous.json()["error"].is_string());

    let signed_in = app
        .get_with_headers("/dashboard", &[(USER_ID_HEADER, "u-7")])
        .await;
    assert_eq!(signed_in.status, StatusCode::OK);
    assert!(signed_in.text().contains("u-7"));
}

#[tokio::test]
async fn admin_panel_distinguishes_401_and_403() {
    let app = TestRouter::new().await;

    assert_eq!(app.get("/admin").await.status, StatusCode::UNAUTHORIZED);

    let regular = app
        .get_with_headers(
            "/admin",
            &[(USER_ID_HEADER, "u-7"), (ROLE_HEADER, "regular_user")],
        )
        .await;
    assert_eq!(regular.status, StatusCode::FORBIDDEN);

    let admin = app
        .get_with_headers("/admin", &[(USER_ID_HEADER, "u-1"), (ROLE_HEADER, "admin")])
        .await;
    assert_eq!(admin.status, StatusCode::OK);
    assert_eq!(admin.text(), "Welcome, Admin.");
}

#[tokio::test]
async fn crash_is_500_with_generic_error() {
    let app = TestRouter::new().await;

    let response = app.get("/crash").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Internal server error");
}

#[tokio::test]
async fn unknown_route_is_404_json() {
    let app = TestRouter::new().await;

    let response = app.get("/no-such-page").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.json()["error"].is_string());
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestRouter::new().await;

    let response = app
        .get_with_headers("/product/1", &[("x-request-id", "req-42")])
        .await;

    assert_eq!(response.headers["x-request-id"], "req-42");
    assert_eq!(response.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(response.headers[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn catalog_is_seeded_only_once() {
    let app = TestRouter::new().await;

    let inserted = survey_service::startup::seed_catalog(app.store.as_ref())
        .await
        .unwrap();

    assert_eq!(inserted, 0);
    let products = app
        .store
        .find(PRODUCTS_COLLECTION, None, None)
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
}
