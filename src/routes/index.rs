use serde_json::json;

use crate::dispatch::RequestContext;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routing::RouteModule;

pub fn module() -> RouteModule {
    RouteModule::new().get(get).summary("Service index")
}

async fn get(_ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::success(json!({
        "name": "pathgate",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Filesystem-shaped routes with token-gated authorization",
        "endpoints": {
            "health": "/health (public)",
            "openapi": "/openapi.json (public)",
            "public": "/api/public (public)",
            "protected": "/api/protected (token)",
            "login": "/api/auth/login (public)",
            "refresh": "/api/auth/refresh (public)",
            "users": "/api/users/{id} (role: user)",
            "admin": "/api/admin/stats (role: admin, permission: read)"
        }
    })))
}
