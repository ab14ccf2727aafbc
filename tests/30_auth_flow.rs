mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{request, TestApp};

#[tokio::test]
async fn login_info_is_public() {
    let app = TestApp::new();
    let res = app.get("/api/auth/login").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["required_fields"], json!(["username", "password"]));
}

#[tokio::test]
async fn bad_logins_look_alike() {
    let app = TestApp::new();

    let wrong_password = app.login("admin", "nope").await;
    let unknown_user = app.login("mallory", "admin123").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.code(), "INVALID_CREDENTIALS");
    assert_eq!(wrong_password.body, unknown_user.body);
}

#[tokio::test]
async fn login_validates_fields() {
    let app = TestApp::new();

    let res = app
        .send(request("POST", "/api/auth/login", None, Some(json!({ "username": "admin" }))))
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.code(), "VALIDATION_ERROR");
    assert!(res.body["field_errors"].get("password").is_some());

    let res = app.login("", "").await;
    assert_eq!(res.code(), "VALIDATION_ERROR");

    let res = app.send(request("POST", "/api/auth/login", None, None)).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn login_then_use_then_refresh() {
    let app = TestApp::new();

    let res = app.login("admin", "admin123").await;
    assert_eq!(res.status, StatusCode::OK);
    let data = &res.body["data"];
    assert_eq!(data["user"]["username"], "admin");
    assert!(data["user"].get("password_hash").is_none());
    assert_eq!(data["tokens"]["token_type"], "bearer");
    assert_eq!(data["expires_in"], 3600);

    let access = data["tokens"]["access_token"].as_str().unwrap().to_string();
    let refresh = data["tokens"]["refresh_token"].as_str().unwrap().to_string();

    let me = app.get_with_token("/api/protected", &access).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["user"]["username"], "admin");

    let stats = app.get_with_token("/api/admin/stats", &access).await;
    assert_eq!(stats.status, StatusCode::OK);

    // refresh tokens never open protected routes
    let res = app.get_with_token("/api/protected", &refresh).await;
    assert_eq!(res.code(), "INVALID_CREDENTIALS");

    // and access tokens never refresh
    let res = app
        .send(request("POST", "/api/auth/refresh", None, Some(json!({ "refresh_token": access }))))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .send(request("POST", "/api/auth/refresh", None, Some(json!({ "refresh_token": refresh }))))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let renewed = res.body["data"]["tokens"]["access_token"].as_str().unwrap().to_string();

    let me = app.get_with_token("/api/protected", &renewed).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["user"]["id"], "1");
}

#[tokio::test]
async fn regular_user_sees_users_but_not_admin_stats() {
    let app = TestApp::new();
    let res = app.login("user", "user123").await;
    let access = res.body["data"]["tokens"]["access_token"].as_str().unwrap().to_string();

    let admin = app.get_with_token("/api/users/1", &access).await;
    assert_eq!(admin.status, StatusCode::OK);
    assert_eq!(admin.body["data"]["user"]["username"], "admin");
    assert_eq!(admin.body["data"]["requested_by"], "2");

    let missing = app.get_with_token("/api/users/99", &access).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.code(), "NOT_FOUND");

    let stats = app.get_with_token("/api/admin/stats", &access).await;
    assert_eq!(stats.status, StatusCode::FORBIDDEN);
}
