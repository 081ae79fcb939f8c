use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use opensase_catalog::auth::signature::{self, SIGNATURE_HEADER};
use opensase_catalog::domain::aggregates::Role;
use opensase_catalog::repository::UserRepository;
use opensase_catalog::{api, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    api::router(AppState::in_memory(Config::for_tests()))
}

fn app_with_state() -> (Router, AppState) {
    let state = AppState::in_memory(Config::for_tests());
    (api::router(state.clone()), state)
}

const BOUNDARY: &str = "catalog-test-boundary";

/// `multipart/form-data` body with text parts followed by file parts.
fn form_body(texts: &[(&str, &str)], files: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in texts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes());
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn put_form(app: &Router, uri: &str, token: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(48, 24, image::Rgba([20, 120, 200, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())).unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn google_callback(app: &Router, body: &Value, signature: Option<String>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(Method::POST).uri("/api/auth/google/callback").header(header::CONTENT_TYPE, "application/json");
    if let Some(sig) = signature {
        req = req.header(SIGNATURE_HEADER, sig);
    }
    let res = app.clone().oneshot(req.body(Body::from(body.to_string())).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn sign(body: &Value) -> String {
    signature::sign(body.to_string().as_bytes(), "test-callback-secret", chrono::Utc::now().timestamp()).unwrap()
}

async fn register(app: &Router, email: &str) -> String {
    let (status, body) = call(app, Method::POST, "/api/auth/register", None, Some(json!({
        "email": email, "name": "Shop Owner", "password": "correct-horse-battery"
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["accessToken"].as_str().unwrap().to_string()
}

async fn store_and_product(app: &Router, token: &str) -> (String, String) {
    let (status, store) = call(app, Method::POST, "/api/stores", Some(token), Some(json!({ "name": "Corner Shop" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let store_id = store["id"].as_str().unwrap().to_string();
    let (status, product) = call(app, Method::POST, "/api/products", Some(token), Some(json!({
        "storeId": store_id, "name": "Blue Teapot", "status": "ACTIVE",
        "variants": [{ "name": "Large", "price": 24.5, "stock": 3 }]
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["slug"], "blue-teapot");
    (store_id, product["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn test_health_is_public() {
    let (status, body) = call(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_catalog_routes_require_token() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["statusCode"], 401);

    let (status, _) = call(&app, Method::GET, "/api/products", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trash_restore_over_http() {
    let app = app();
    let token = register(&app, "owner@example.com").await;
    let (store_id, product_id) = store_and_product(&app, &token).await;

    let (status, trashed) = call(&app, Method::DELETE, &format!("/api/products/{product_id}?storeId={store_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trashed["status"], "DELETED");
    assert_eq!(trashed["isDeleted"], true);
    assert!(trashed["deletedAt"].is_string());

    let (status, page) = call(&app, Method::GET, &format!("/api/products/trash/{store_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);
    assert_eq!(page["data"][0]["daysUntilPurge"], 30);

    let (status, err) = call(&app, Method::DELETE, &format!("/api/products/{product_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["statusCode"], 400);

    let (status, restored) = call(&app, Method::PATCH, &format!("/api/products/{product_id}/restore"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["status"], "DRAFT");
    assert_eq!(restored["isDeleted"], false);
    assert!(restored["deletedAt"].is_null());
}

#[tokio::test]
async fn test_permanent_delete_over_http() {
    let app = app();
    let token = register(&app, "owner@example.com").await;
    let (store_id, product_id) = store_and_product(&app, &token).await;

    let (status, _) = call(&app, Method::DELETE, &format!("/api/products/{product_id}/permanent"), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::DELETE, &format!("/api/products/{product_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, report) = call(&app, Method::DELETE, &format!("/api/products/{product_id}/permanent?storeId={store_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["deletedCount"], 1);

    let (status, _) = call(&app, Method::GET, &format!("/api/products/{product_id}?includeDeleted=true"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_delete_reports_failures_over_http() {
    let app = app();
    let token = register(&app, "owner@example.com").await;
    let (store_id, trashed) = store_and_product(&app, &token).await;
    let (status, live) = call(&app, Method::POST, "/api/products", Some(&token), Some(json!({ "storeId": store_id, "name": "Red Mug" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let live = live["id"].as_str().unwrap().to_string();
    call(&app, Method::DELETE, &format!("/api/products/{trashed}"), Some(&token), None).await;

    let (status, report) = call(&app, Method::POST, "/api/products/trash/bulk-delete", Some(&token), Some(json!({
        "productIds": [trashed, live], "storeId": store_id
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["deletedCount"], 1);
    assert_eq!(report["failedIds"], json!([live]));
}

#[tokio::test]
async fn test_store_scope_mismatch_is_forbidden() {
    let app = app();
    let token = register(&app, "owner@example.com").await;
    let (_, product_id) = store_and_product(&app, &token).await;
    let elsewhere = uuid::Uuid::new_v4();

    let (status, body) = call(&app, Method::DELETE, &format!("/api/products/{product_id}?storeId={elsewhere}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["statusCode"], 403);

    let (status, product) = call(&app, Method::GET, &format!("/api/products/{product_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["isDeleted"], false);
}

#[tokio::test]
async fn test_invalid_body_is_bad_request() {
    let app = app();
    let token = register(&app, "owner@example.com").await;
    let (status, body) = call(&app, Method::POST, "/api/stores", Some(&token), Some(json!({ "name": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn test_google_callback_requires_signature() {
    let app = app();
    let body = json!({ "email": "newcomer@example.com", "name": "Newcomer" });

    let (status, _) = google_callback(&app, &body, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let forged = signature::sign(body.to_string().as_bytes(), "guessed-secret", chrono::Utc::now().timestamp()).unwrap();
    let (status, _) = google_callback(&app, &body, Some(forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, session) = google_callback(&app, &body, Some(sign(&body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["email"], "newcomer@example.com");
    assert!(session["accessToken"].is_string());
}

#[tokio::test]
async fn test_google_callback_cannot_take_over_password_account() {
    let app = app();
    register(&app, "owner@example.com").await;
    let body = json!({ "email": "owner@example.com" });
    let (status, body) = google_callback(&app, &body, Some(sign(&body))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["accessToken"].is_null());
}

#[tokio::test]
async fn test_reorder_validates_image_list() {
    let app = app();
    let token = register(&app, "owner@example.com").await;
    let (_, product_id) = store_and_product(&app, &token).await;
    let (status, body) = call(&app, Method::PATCH, &format!("/api/products/{product_id}/images/reorder"), Some(&token), Some(json!({ "images": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);

    let (status, listed) = call(&app, Method::GET, &format!("/api/products/{product_id}/images"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_profile_update_over_multipart() {
    let app = app();
    let token = register(&app, "ada@example.com").await;
    let locations = json!([{ "addressLine": "2 Broad St", "city": "Lagos", "country": "NG", "isDefault": true }]).to_string();
    let body = form_body(&[("name", "Ada L"), ("locations", &locations)], &[("profile", "me.png", png())]);

    let (status, changed) = put_form(&app, "/api/auth/profile", &token, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["name"], "Ada L");
    assert!(changed["profileImage"]["profile"].is_string());
    assert!(changed["profileImage"]["thumbnail"].is_string());
    assert!(changed["profileImage"]["profileAssetId"].is_null());
    assert_eq!(changed["locations"][0]["isDefault"], true);

    let (status, me) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["locations"].as_array().unwrap().len(), 1);
    assert_eq!(me["recentComments"], json!([]));
    assert!(me["store"].is_null());

    let (status, user) = call(&app, Method::GET, "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Ada L");
}

#[tokio::test]
async fn test_profile_update_rejects_bad_locations_json() {
    let app = app();
    let token = register(&app, "ada@example.com").await;
    let (status, body) = put_form(&app, "/api/auth/profile", &token, form_body(&[("locations", "not json")], &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn test_locations_of_another_user_are_forbidden() {
    let app = app();
    let owner = register(&app, "owner@example.com").await;
    let other = register(&app, "other@example.com").await;
    let locations = json!([{ "addressLine": "1 Marina", "country": "NG", "isDefault": true }]).to_string();
    let (status, changed) = put_form(&app, "/api/auth/profile", &owner, form_body(&[("locations", &locations)], &[])).await;
    assert_eq!(status, StatusCode::OK);
    let owner_id = changed["id"].as_str().unwrap().to_string();
    let location_id = changed["locations"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::GET, &format!("/api/auth/{owner_id}/locations"), Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let uri = format!("/api/auth/{owner_id}/location/{location_id}/set-default");
    let (status, _) = call(&app, Method::PATCH, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, location) = call(&app, Method::PATCH, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(location["isDefault"], true);
    let (status, default) = call(&app, Method::GET, &format!("/api/auth/{owner_id}/location/default"), Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(default["id"], location_id.as_str());

    let (status, _) = call(&app, Method::DELETE, &format!("/api/auth/{owner_id}/location/{location_id}"), Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let (app, state) = app_with_state();
    let token = register(&app, "boss@example.com").await;
    register(&app, "member@example.com").await;

    let (status, _) = call(&app, Method::GET, "/api/auth", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut boss = state.catalog.find_user_by_email("boss@example.com").await.unwrap().unwrap();
    boss.role = Role::Admin;
    state.catalog.save_user(&boss).await.unwrap();
    let (status, session) = call(&app, Method::POST, "/api/auth/login", None, Some(json!({
        "email": "boss@example.com", "password": "correct-horse-battery"
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    let admin = session["accessToken"].as_str().unwrap().to_string();

    let (status, admins) = call(&app, Method::GET, "/api/auth?role=ADMIN", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admins.as_array().unwrap().len(), 1);

    let member = state.catalog.find_user_by_email("member@example.com").await.unwrap().unwrap();
    let (status, updated) = call(&app, Method::PATCH, &format!("/api/auth/{}", member.id), Some(&admin), Some(json!({ "status": "BANNED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "BANNED");

    let (status, removal) = call(&app, Method::DELETE, &format!("/api/auth/{}", member.id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removal["userId"], member.id.to_string());
    let (status, _) = call(&app, Method::GET, &format!("/api/auth/{}", member.id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
