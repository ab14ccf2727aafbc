use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::AuthServices;
use crate::dispatch::RequestContext;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routes::DemoUsers;
use crate::routing::RouteModule;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

pub fn module(auth: AuthServices, users: Arc<DemoUsers>) -> RouteModule {
    RouteModule::new()
        .get(info)
        .post(move |ctx: RequestContext| {
            let auth = auth.clone();
            let users = users.clone();
            async move { login(ctx, &auth, &users).await }
        })
        .summary("Exchange username and password for a token pair")
}

async fn info(_ctx: RequestContext) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse::success(json!({
        "message": "POST to this endpoint to authenticate",
        "required_fields": ["username", "password"],
        "example_request": { "username": "admin", "password": "admin123" },
        "demo_accounts": [
            { "username": "admin", "password": "admin123", "roles": ["admin", "user"], "permissions": ["read", "write", "delete"] },
            { "username": "user", "password": "user123", "roles": ["user"], "permissions": ["read"] }
        ]
    })))
}

async fn login(ctx: RequestContext, auth: &AuthServices, users: &DemoUsers) -> Result<ApiResponse, ApiError> {
    let request: LoginRequest = ctx.json()?;

    let mut field_errors = HashMap::new();
    if request.username.trim().is_empty() {
        field_errors.insert("username".to_string(), "Username is required".to_string());
    }
    if request.password.is_empty() {
        field_errors.insert("password".to_string(), "Password is required".to_string());
    }
    if !field_errors.is_empty() {
        return Err(ApiError::validation_error(
            "Username and password are required",
            Some(field_errors),
        ));
    }

    let user = match users.by_username(&request.username) {
        Some(user) if user.active => user,
        _ => {
            // same bcrypt cost as a wrong password, so timing does not reveal accounts
            auth.credentials
                .verify_async(request.password, users.decoy_hash().to_string())
                .await;
            tracing::debug!("login rejected: unknown or inactive user '{}'", request.username);
            return Err(ApiError::invalid_credentials());
        }
    };

    if !auth
        .credentials
        .verify_async(request.password, user.password_hash.clone())
        .await
    {
        tracing::debug!("login rejected: wrong password for '{}'", user.username);
        return Err(ApiError::invalid_credentials());
    }

    let tokens = auth.tokens.issue_pair(user.claims())?;
    tracing::info!("user '{}' logged in", user.username);

    Ok(ApiResponse::success(json!({
        "user": user,
        "tokens": tokens,
        "expires_in": tokens.expires_in
    })))
}
