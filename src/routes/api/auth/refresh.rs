use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthServices;
use crate::dispatch::RequestContext;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routing::RouteModule;

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

pub fn module(auth: AuthServices) -> RouteModule {
    RouteModule::new()
        .post(move |ctx: RequestContext| {
            let auth = auth.clone();
            async move {
                let request: RefreshRequest = ctx.json()?;
                let tokens = auth.tokens.refresh(&request.refresh_token)?;
                Ok::<_, ApiError>(ApiResponse::success(json!({
                    "tokens": tokens,
                    "expires_in": tokens.expires_in
                })))
            }
        })
        .summary("Trade a refresh token for a new token pair")
}
