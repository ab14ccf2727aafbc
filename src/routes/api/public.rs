use chrono::Utc;
use serde_json::{json, Value};

use crate::dispatch::RequestContext;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routing::RouteModule;

pub fn module() -> RouteModule {
    RouteModule::new().get(get).post(post).summary("Open endpoint")
}

async fn get(_ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::success(json!({
        "message": "This is a public endpoint",
        "timestamp": Utc::now(),
        "public": true
    })))
}

async fn post(ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    let received = ctx.body_json().cloned().unwrap_or(Value::Null);
    Ok(ApiResponse::success(json!({
        "message": "Public POST request received",
        "received_data": received,
        "public": true
    })))
}
