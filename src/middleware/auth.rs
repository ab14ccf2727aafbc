use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::app::AppContext;
use crate::auth::{AccessPolicy, Principal, TokenCodec, TokenKind};
use crate::error::ApiError;

/// Authorization gate. Classifies the request path, demands and verifies an
/// access token where required, and injects the resolved [`Principal`] into
/// the request extensions for the handler invoker.
pub async fn authorization_gate(
    State(ctx): State<Arc<AppContext>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(&ctx.policy, &ctx.auth.tokens, request.uri().path(), request.headers())?;

    if let Some(principal) = principal {
        tracing::debug!("authenticated subject '{}' for {}", principal.subject, request.uri().path());
        request.extensions_mut().insert(principal);
    }

    Ok(next.run(request).await)
}

/// The gate's decision for one request, without the middleware plumbing.
///
/// `Ok(None)` means the request proceeds anonymously.
pub fn authenticate(
    policy: &AccessPolicy,
    tokens: &TokenCodec,
    path: &str,
    headers: &HeaderMap,
) -> Result<Option<Principal>, ApiError> {
    let class = policy.classify(path);
    tracing::trace!("access class for {}: {:?}", path, class);

    if !policy.requires_token_for(class) {
        return Ok(None);
    }

    let token = extract_bearer_token(headers)?;

    let claims = tokens.verify(token, TokenKind::Access).map_err(|e| {
        // Reason stays in the logs; the client only sees INVALID_CREDENTIALS.
        tracing::debug!("rejected token for {}: {}", path, e);
        ApiError::from(e)
    })?;

    Ok(Some(Principal::from(claims)))
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(ApiError::missing_credentials)?;

    let auth_str = auth_header.to_str().map_err(|_| {
        tracing::debug!("authorization header is not valid ASCII");
        ApiError::invalid_credentials()
    })?;

    let auth_str = auth_str.trim();
    if auth_str.is_empty() {
        return Err(ApiError::missing_credentials());
    }

    let (scheme, token) = auth_str.split_once(' ').unwrap_or((auth_str, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        tracing::debug!("authorization header uses unsupported scheme '{}'", scheme);
        return Err(ApiError::invalid_credentials());
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::missing_credentials());
    }
    Ok(token)
}
