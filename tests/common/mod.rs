#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

use pathgate::auth::{AuthServices, Claims, TokenKind};
use pathgate::config::AppConfig;
use pathgate::{build_router, AppContext, HandlerRegistry};

pub const BODY_LIMIT: usize = 1024;

/// Development preset with a signing key, cheap bcrypt and an explicit default.
pub fn test_config_with(overrides: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = [
        ("SECURITY_JWT_SECRET", "integration-test-secret"),
        ("SECURITY_DEFAULT_ACCESS", "open"),
        ("SECURITY_BCRYPT_COST", "4"),
        ("API_MAX_REQUEST_SIZE_BYTES", "1024"),
        ("API_ENABLE_REQUEST_LOGGING", "false"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub fn test_config() -> AppConfig {
    test_config_with(&[])
}

pub struct TestApp {
    pub router: Router,
    pub context: Arc<AppContext>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let context = Arc::new(AppContext::from_config(&config).expect("assemble app"));
        let router = build_router(context.clone(), &config);
        Self { router, context }
    }

    pub fn with_registry(config: AppConfig, registry: HandlerRegistry) -> Self {
        let auth = AuthServices::from_config(&config.security).expect("auth services");
        let context = Arc::new(AppContext::assemble(&config, &registry, auth).expect("assemble app"));
        let router = build_router(context.clone(), &config);
        Self { router, context }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
        };
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(request("GET", uri, None, None)).await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> TestResponse {
        self.send(request("GET", uri, Some(token), None)).await
    }

    /// Access token signed with the app's own key.
    pub fn access_token(&self, subject: &str, roles: &[&str], permissions: &[&str]) -> String {
        let claims = Claims::new(subject)
            .with_roles(roles.iter().copied())
            .with_permissions(permissions.iter().copied());
        self.context
            .auth
            .tokens
            .issue(claims, TokenKind::Access, Duration::minutes(5))
            .unwrap()
            .into_string()
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": username, "password": password })),
        ))
        .await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or("")
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
