mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Map, Value};

use common::{request, test_config, test_config_with, TestApp, BODY_LIMIT};
use pathgate::{ApiError, ApiResponse, BuildError, HandlerRegistry, RequestContext, RouteModule};

async fn echo(ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    let params: Map<String, Value> = ctx
        .params
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    Ok(ApiResponse::json(json!({ "path": ctx.path, "params": params })))
}

fn echo_registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("index", RouteModule::new().get(echo))
        .unwrap()
        .register("files/[name]", RouteModule::new().get(echo))
        .unwrap()
        .register("files/latest", RouteModule::new().get(echo))
        .unwrap()
        .register("orgs/[org]/repos/[repo]", RouteModule::new().get(echo).delete(echo))
        .unwrap()
}

#[tokio::test]
async fn index_and_health_are_served() {
    let app = TestApp::new();

    let index = app.get("/").await;
    assert_eq!(index.status, StatusCode::OK);
    assert_eq!(index.body["success"], true);
    assert_eq!(index.body["data"]["name"], "pathgate");

    let health = app.get("/health/").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["data"]["status"], "ok");
}

#[tokio::test]
async fn unknown_path_is_route_not_found() {
    let app = TestApp::new();
    let res = app.get("/nowhere").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.code(), "ROUTE_NOT_FOUND");
    assert_eq!(res.body["error"], true);
}

#[tokio::test]
async fn wrong_method_lists_allowed_methods() {
    let app = TestApp::new();
    let res = app.send(request("DELETE", "/api/public", None, None)).await;

    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.code(), "METHOD_NOT_ALLOWED");
    assert_eq!(res.headers[header::ALLOW], "GET, POST, HEAD");
}

#[tokio::test]
async fn head_is_answered_by_get() {
    let app = TestApp::new();
    let res = app.send(request("HEAD", "/health", None, None)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn parameters_are_bound_and_decoded() {
    let app = TestApp::with_registry(test_config(), echo_registry());

    let res = app.get("/orgs/acme/repos/road%20runner").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["params"], json!({ "org": "acme", "repo": "road runner" }));

    let res = app.get("/files/report.pdf").await;
    assert_eq!(res.body["params"], json!({ "name": "report.pdf" }));
}

#[tokio::test]
async fn static_segment_beats_parameter() {
    let app = TestApp::with_registry(test_config(), echo_registry());
    let res = app.get("/files/latest").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["params"], json!({}));
}

#[tokio::test]
async fn table_order_is_deterministic() {
    let app = TestApp::with_registry(test_config(), echo_registry());
    let listing: Vec<String> = app
        .context
        .table
        .entries()
        .iter()
        .map(|e| format!("{} {}", e.method, e.pattern))
        .collect();

    assert_eq!(
        listing,
        vec![
            "GET /",
            "GET /files/latest",
            "GET /files/{name}",
            "GET /orgs/{org}/repos/{repo}",
            "DELETE /orgs/{org}/repos/{repo}",
        ]
    );
}

#[test]
fn colliding_modules_abort_assembly() {
    let config = test_config();
    let registry = HandlerRegistry::new()
        .register("docs", RouteModule::new().get(echo))
        .unwrap()
        .register("docs/index", RouteModule::new().get(echo))
        .unwrap();
    let auth = pathgate::auth::AuthServices::from_config(&config.security).unwrap();

    let err = pathgate::AppContext::assemble(&config, &registry, auth).unwrap_err();
    assert!(matches!(err, BuildError::RouteCollision { .. }), "unexpected error: {err}");
}

#[test]
fn missing_signing_key_aborts_assembly() {
    let config = test_config_with(&[("SECURITY_JWT_SECRET", "")]);
    assert!(matches!(
        pathgate::AppContext::from_config(&config),
        Err(BuildError::Config(_))
    ));
}

#[test]
fn out_of_range_token_lifetime_aborts_assembly() {
    let config = test_config_with(&[("SECURITY_REFRESH_TOKEN_TTL_DAYS", "100000000")]);
    let err = pathgate::AppContext::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("SECURITY_REFRESH_TOKEN_TTL_DAYS"), "unexpected error: {err}");
}

#[test]
fn missing_default_access_aborts_assembly() {
    let mut config = test_config();
    config.security.default_access = None;
    assert!(matches!(
        pathgate::AppContext::from_config(&config),
        Err(BuildError::Config(_))
    ));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = TestApp::new();
    let res = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/public")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(vec![b' '; BODY_LIMIT * 2]))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.code(), "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn malformed_json_is_rejected_before_the_handler() {
    let app = TestApp::new();
    let res = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/public")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"unterminated\":"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.code(), "MALFORMED_BODY");
}

#[tokio::test]
async fn json_body_reaches_the_handler() {
    let app = TestApp::new();
    let res = app
        .send(request("POST", "/api/public", None, Some(json!({ "hello": "world" }))))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["received_data"], json!({ "hello": "world" }));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();
    let res = app.get("/openapi.json").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["openapi"], "3.1.0");

    let user = &res.body["paths"]["/api/users/{id}"]["get"];
    assert_eq!(user["parameters"][0]["name"], "id");
    assert_eq!(user["security"][0]["bearerAuth"], json!([]));
    assert!(res.body["paths"]["/health"]["get"].get("security").is_none());

    let res = app.send(request("POST", "/openapi.json", None, None)).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = TestApp::new();
    let res = app.get("/health").await;
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert_eq!(res.headers["x-frame-options"], "DENY");
    assert_eq!(res.headers["referrer-policy"], "no-referrer");

    let bare = TestApp::with_config(test_config_with(&[("SECURITY_HEADERS", "false")]));
    let res = bare.get("/health").await;
    assert!(res.headers.get("x-frame-options").is_none());
}
