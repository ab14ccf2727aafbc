use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::dispatch::RequestContext;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routing::RouteModule;

pub fn module() -> RouteModule {
    RouteModule::new()
        .get(get)
        .post(post)
        .put(put)
        .summary("Any authenticated caller")
}

fn caller(principal: &Principal) -> Value {
    json!({
        "id": principal.subject,
        "username": principal.attribute("username").unwrap_or("unknown"),
        "roles": principal.roles,
        "permissions": principal.permissions
    })
}

async fn get(ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    let principal = ctx.require_principal()?;
    Ok(ApiResponse::success(json!({
        "message": "This is a protected endpoint",
        "timestamp": Utc::now(),
        "user": caller(principal)
    })))
}

async fn post(ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    let principal = ctx.require_principal()?;
    Ok(ApiResponse::success(json!({
        "message": "Protected POST request received",
        "user": caller(principal),
        "received_data": ctx.body_json().cloned().unwrap_or(Value::Null),
        "processed": true
    })))
}

async fn put(ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    let principal = ctx.require_principal()?;
    Ok(ApiResponse::success(json!({
        "message": "Protected PUT request received",
        "user": caller(principal),
        "received_data": ctx.body_json().cloned().unwrap_or(Value::Null),
        "updated": true
    })))
}
