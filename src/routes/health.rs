use chrono::Utc;
use serde_json::json;
use std::time::Instant;

use crate::dispatch::RequestContext;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routing::RouteModule;

pub fn module(started: Instant) -> RouteModule {
    RouteModule::new()
        .get(move |_ctx: RequestContext| async move {
            Ok::<_, ApiError>(ApiResponse::success(json!({
                "status": "ok",
                "timestamp": Utc::now(),
                "uptime_seconds": started.elapsed().as_secs(),
                "version": env!("CARGO_PKG_VERSION")
            })))
        })
        .summary("Liveness check")
}
