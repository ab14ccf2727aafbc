// dispatch.rs - Handler invocation
//
// One axum fallback serves every request: resolve against the dispatch
// table, enforce the entry's guard, read and pre-parse the body, then call
// the handler with a RequestContext.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::app::AppContext;
use crate::auth::{Principal, RouteGuard};
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routing::PathParams;

/// Everything a handler gets to see about one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub params: PathParams,
    principal: Option<Principal>,
    body: Bytes,
    json: Option<Value>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            params: PathParams::default(),
            principal: None,
            body: Bytes::new(),
            json: None,
        }
    }

    pub fn with_params(mut self, params: PathParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query.map(parse_query).unwrap_or_default();
        self
    }

    pub fn with_body(mut self, body: Bytes, json: Option<Value>) -> Self {
        self.body = body;
        self.json = json;
        self
    }

    /// Shorthand for tests and internal callers that already hold a value.
    pub fn with_json(self, value: Value) -> Self {
        let body = Bytes::from(value.to_string());
        self.with_body(body, Some(value))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The principal, or 401 when the request arrived anonymously.
    pub fn require_principal(&self) -> Result<&Principal, ApiError> {
        self.principal.as_ref().ok_or_else(ApiError::missing_credentials)
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Parsed JSON body, when the request declared JSON and sent one.
    pub fn body_json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Deserialize the JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let value = self
            .json
            .clone()
            .ok_or_else(|| ApiError::validation_error("A JSON request body is required", None))?;

        serde_json::from_value(value).map_err(|e| {
            let message = e.to_string();
            let field_errors = field_from_message(&message).map(|field| {
                let mut errors = HashMap::new();
                errors.insert(field, message.clone());
                errors
            });
            ApiError::validation_error(format!("Invalid request body: {}", message), field_errors)
        })
    }
}

/// serde names the field in "missing field `x`" / "unknown field `x`".
fn field_from_message(message: &str) -> Option<String> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    if message.starts_with("missing field") || message.starts_with("unknown field") {
        Some(message[start..start + len].to_string())
    } else {
        None
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

/// The router's fallback: every request ends up here after the gate.
pub async fn dispatch(State(app): State<Arc<AppContext>>, request: Request) -> Response {
    match invoke(&app, request).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            if err.status_code() >= 500 {
                tracing::error!("request failed: {}", err);
            }
            err.into_response()
        }
    }
}

/// Resolve, authorize, read the body and run the matched handler.
pub async fn invoke(app: &AppContext, request: Request) -> Result<ApiResponse, ApiError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    let resolved = app.table.resolve(&parts.method, &path)?;
    let principal = parts.extensions.get::<Principal>().cloned();

    enforce_guard(&resolved.entry.guard, principal.as_ref(), &parts.method, &path)?;

    let bytes = read_body(body, &parts.headers, app.limits.max_body_bytes).await?;
    let json = parse_json_body(&parts.headers, &bytes)?;

    let ctx = RequestContext::new(parts.method.clone(), path)
        .with_query(parts.uri.query())
        .with_headers(parts.headers)
        .with_params(resolved.params)
        .with_principal(principal)
        .with_body(bytes, json);

    tracing::debug!(
        "dispatching {} {} to '{}'",
        ctx.method,
        ctx.path,
        resolved.entry.source
    );

    resolved.entry.handler.call(ctx).await
}

/// Guards need an authenticated principal whose sets cover the requirement.
pub fn enforce_guard(
    guard: &RouteGuard,
    principal: Option<&Principal>,
    method: &Method,
    path: &str,
) -> Result<(), ApiError> {
    if guard.is_empty() {
        return Ok(());
    }

    let principal = principal.ok_or_else(|| {
        tracing::debug!("{} {} requires a principal but the request is anonymous", method, path);
        ApiError::missing_credentials()
    })?;

    guard.check(principal).map_err(|shortfall| {
        tracing::warn!(
            "subject '{}' denied {} {}: {}",
            principal.subject,
            method,
            path,
            shortfall
        );
        ApiError::forbidden("Insufficient privileges for this resource")
    })
}

async fn read_body(body: Body, headers: &HeaderMap, limit: usize) -> Result<Bytes, ApiError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.map_or(false, |len| len > limit) {
        return Err(ApiError::payload_too_large(limit));
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ApiError::payload_too_large(limit)),
        Err(e) => {
            tracing::debug!("failed to read request body: {}", e);
            Err(ApiError::bad_request("Failed to read request body"))
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

fn parse_json_body(headers: &HeaderMap, bytes: &Bytes) -> Result<Option<Value>, ApiError> {
    if bytes.is_empty() || !is_json(headers) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|e| ApiError::malformed_body(format!("Request body is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Login {
        username: String,
        #[allow(dead_code)]
        password: String,
    }

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            subject: "9".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: Default::default(),
            attributes: Default::default(),
        }
    }

    #[test]
    fn typed_body_reports_missing_field() {
        let ctx = RequestContext::new(Method::POST, "/login").with_json(json!({ "username": "a" }));
        let err = ctx.json::<Login>().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_json()["field_errors"].get("password").is_some());

        let ok = RequestContext::new(Method::POST, "/login")
            .with_json(json!({ "username": "a", "password": "b" }))
            .json::<Login>()
            .unwrap();
        assert_eq!(ok.username, "a");
    }

    #[test]
    fn typed_body_requires_a_body() {
        let err = RequestContext::new(Method::POST, "/login").json::<Login>().unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn query_is_decoded() {
        let ctx = RequestContext::new(Method::GET, "/").with_query(Some("q=a%20b&flag&name=x+y"));
        assert_eq!(ctx.query_param("q"), Some("a b"));
        assert_eq!(ctx.query_param("flag"), Some(""));
        assert_eq!(ctx.query_param("name"), Some("x y"));
    }

    #[test]
    fn json_is_parsed_only_for_json_content() {
        let mut headers = HeaderMap::new();
        let body = Bytes::from_static(b"{oops");
        assert_eq!(parse_json_body(&headers, &body).unwrap(), None);

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert_eq!(parse_json_body(&headers, &body).unwrap_err().error_code(), "MALFORMED_BODY");
        assert_eq!(parse_json_body(&headers, &Bytes::new()).unwrap(), None);

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/merge-patch+json"));
        assert_eq!(
            parse_json_body(&headers, &Bytes::from_static(b"{\"a\":1}")).unwrap(),
            Some(json!({ "a": 1 }))
        );
    }

    #[test]
    fn guards_need_a_principal_with_the_right_roles() {
        let guard = RouteGuard::roles(["admin"]);
        let path = "/api/admin/stats";

        assert_eq!(
            enforce_guard(&guard, None, &Method::GET, path).unwrap_err().error_code(),
            "MISSING_CREDENTIALS"
        );
        assert_eq!(
            enforce_guard(&guard, Some(&principal(&["user"])), &Method::GET, path)
                .unwrap_err()
                .error_code(),
            "FORBIDDEN"
        );
        assert!(enforce_guard(&guard, Some(&principal(&["admin"])), &Method::GET, path).is_ok());
        assert!(enforce_guard(&RouteGuard::default(), None, &Method::GET, path).is_ok());
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let err = read_body(Body::from(vec![b'x'; 64]), &HeaderMap::new(), 16)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 413);

        let bytes = read_body(Body::from("small"), &HeaderMap::new(), 16).await.unwrap();
        assert_eq!(&bytes[..], b"small");
    }
}
