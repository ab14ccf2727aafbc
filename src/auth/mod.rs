// auth/mod.rs - Token codec, credential hashing and access policy
//
// Everything here is pure or CPU-bound. Request-time gating lives in
// middleware::auth and consumes these pieces.

pub mod credentials;
pub mod policy;
pub mod principal;
pub mod token;

use chrono::Duration;
use std::sync::Arc;

pub use credentials::{generate_api_key, generate_password, CredentialError, CredentialVerifier, PasswordPolicy};
pub use policy::{AccessClass, AccessPolicy, DefaultAccess, PathRule};
pub use principal::{GuardShortfall, Principal, RouteGuard};
pub use token::{Claims, Token, TokenCodec, TokenError, TokenKind, TokenPair};

use crate::config::SecurityConfig;
use crate::error::{ApiError, BuildError};

/// The auth capabilities handed to route modules at registration time so
/// login/refresh handlers can mint tokens without knowing how they are signed.
#[derive(Debug, Clone)]
pub struct AuthServices {
    pub tokens: Arc<TokenCodec>,
    pub credentials: Arc<CredentialVerifier>,
}

impl AuthServices {
    pub fn new(tokens: TokenCodec, credentials: CredentialVerifier) -> Self {
        Self {
            tokens: Arc::new(tokens),
            credentials: Arc::new(credentials),
        }
    }

    /// An absent signing key is tolerated here; it surfaces as a
    /// configuration error on first issuance or when the app is assembled.
    pub fn from_config(security: &SecurityConfig) -> Result<Self, BuildError> {
        let access_ttl = token_lifetime(
            "SECURITY_ACCESS_TOKEN_TTL_MINUTES",
            security.access_token_ttl_minutes,
            Duration::try_minutes,
        )?;
        let refresh_ttl = token_lifetime(
            "SECURITY_REFRESH_TOKEN_TTL_DAYS",
            security.refresh_token_ttl_days,
            Duration::try_days,
        )?;

        let tokens = TokenCodec::new(security.jwt_secret.as_deref(), access_ttl, refresh_ttl);
        let credentials = CredentialVerifier::new(security.bcrypt_cost)
            .map_err(|e| BuildError::config(e.to_string()))?;

        Ok(Self::new(tokens, credentials))
    }
}

/// Longest lifetime either token kind may be configured with.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// A configured lifetime must be positive and at most [`MAX_TOKEN_TTL_DAYS`].
fn token_lifetime(
    key: &str,
    value: u64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, BuildError> {
    let ttl = i64::try_from(value).ok().filter(|v| *v > 0).and_then(unit);
    let max = Duration::try_days(MAX_TOKEN_TTL_DAYS);

    match (ttl, max) {
        (Some(ttl), Some(max)) if ttl <= max => Ok(ttl),
        _ => Err(BuildError::config(format!(
            "{} must be positive and at most {} days, got {}",
            key, MAX_TOKEN_TTL_DAYS, value
        ))),
    }
}

// Convert codec errors at the HTTP boundary. Every verification failure
// collapses into the same generic 401.
impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Config => {
                tracing::error!("token operation attempted without a signing key");
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            TokenError::Signing(msg) => {
                tracing::error!("token signing failed: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            TokenError::InvalidLifetime(ttl) => {
                tracing::error!("token lifetime {} is out of range", ttl);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            TokenError::ReservedClaim(name) => {
                tracing::error!("handler tried to issue a token with reserved claim '{}'", name);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            other => {
                tracing::debug!("token rejected: {}", other);
                ApiError::invalid_credentials()
            }
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::WeakPolicy(msg) => ApiError::bad_request(msg),
            other => {
                tracing::error!("credential operation failed: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn security(vars: &[(&str, &str)]) -> SecurityConfig {
        let lookup = |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .or_else(|| (key == "SECURITY_BCRYPT_COST").then(|| "4".to_string()))
        };
        AppConfig::from_lookup(lookup).unwrap().security
    }

    #[test]
    fn configured_lifetimes_reach_the_codec() {
        let auth = AuthServices::from_config(&security(&[
            ("SECURITY_ACCESS_TOKEN_TTL_MINUTES", "30"),
            ("SECURITY_REFRESH_TOKEN_TTL_DAYS", "3650"),
        ]))
        .unwrap();
        assert_eq!(auth.tokens.access_ttl(), Duration::minutes(30));
        assert_eq!(auth.tokens.refresh_ttl(), Duration::days(3650));
    }

    #[test]
    fn out_of_range_lifetimes_fail_at_startup() {
        for (key, value) in [
            ("SECURITY_ACCESS_TOKEN_TTL_MINUTES", "0"),
            ("SECURITY_REFRESH_TOKEN_TTL_DAYS", "0"),
            ("SECURITY_REFRESH_TOKEN_TTL_DAYS", "3651"),
            ("SECURITY_REFRESH_TOKEN_TTL_DAYS", "100000000"),
            ("SECURITY_ACCESS_TOKEN_TTL_MINUTES", "18446744073709551615"),
        ] {
            let err = AuthServices::from_config(&security(&[(key, value)])).unwrap_err();
            assert!(matches!(err, BuildError::Config(_)), "{}={} accepted", key, value);
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn lifetime_overflow_is_a_server_error() {
        let err = ApiError::from(TokenError::InvalidLifetime(Duration::days(1)));
        assert_eq!(err.status_code(), 500);
    }
}
