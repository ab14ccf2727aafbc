use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

/// Wire format version stamped into every token.
const TOKEN_VERSION: u8 = 1;

/// Claim names owned by the codec; extension fields may not reuse them.
const RESERVED_CLAIMS: &[&str] = &[
    "sub", "iat", "exp", "nbf", "aud", "iss", "kind", "ver", "roles", "permissions",
];

/// Structured payload inside a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Access tokens reach resources; refresh tokens only mint new access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Opaque signed token string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access + refresh pair handed to clients after login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: Token,
    pub refresh_token: Token,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing key is not configured")]
    Config,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("expected a {expected} token, got a {found} token")]
    TokenKindMismatch { expected: TokenKind, found: TokenKind },

    #[error("claim '{0}' is reserved")]
    ReservedClaim(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("token lifetime {0} is out of range")]
    InvalidLifetime(Duration),
}

/// What actually goes over the wire: the claims plus codec metadata.
#[derive(Debug, Serialize, Deserialize)]
struct TokenBody {
    #[serde(flatten)]
    claims: Claims,
    kind: TokenKind,
    ver: u8,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies HS256 tokens. Holds nothing mutable beyond the key,
/// so a single instance serves every request concurrently.
#[derive(Clone)]
pub struct TokenCodec {
    keys: Option<SigningKeys>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("configured", &self.keys.is_some())
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenCodec {
    /// An empty or absent secret leaves the codec unconfigured; every
    /// operation then fails with [`TokenError::Config`].
    pub fn new(secret: Option<&str>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let keys = secret.filter(|s| !s.is_empty()).map(|secret| SigningKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        });

        Self {
            keys,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn keys(&self) -> Result<&SigningKeys, TokenError> {
        self.keys.as_ref().ok_or(TokenError::Config)
    }

    /// Stamp `issued_at`/`expires_at` and sign.
    pub fn issue(&self, claims: Claims, kind: TokenKind, ttl: Duration) -> Result<Token, TokenError> {
        self.issue_at(claims, kind, ttl, Utc::now())
    }

    /// [`issue`](Self::issue) with an explicit issuance instant.
    pub fn issue_at(
        &self,
        mut claims: Claims,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Token, TokenError> {
        let keys = self.keys()?;

        if let Some(reserved) = claims.extra.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
            return Err(TokenError::ReservedClaim(reserved.clone()));
        }

        claims.issued_at = now.timestamp();
        claims.expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenError::InvalidLifetime(ttl))?
            .timestamp();

        let body = TokenBody {
            claims,
            kind,
            ver: TOKEN_VERSION,
        };

        encode(&Header::new(Algorithm::HS256), &body, &keys.encoding)
            .map(Token)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, then expiry, then kind, in that order.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, expected, Utc::now())
    }

    /// [`verify`](Self::verify) against an explicit clock.
    pub fn verify_at(&self, token: &str, expected: TokenKind, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let keys = self.keys()?;

        // Expiry is checked below, after the signature, with zero leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

        let body = decode::<TokenBody>(token, &keys.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;

        if body.ver != TOKEN_VERSION {
            return Err(TokenError::Malformed(format!("unsupported token version {}", body.ver)));
        }

        if body.claims.expires_at <= now.timestamp() {
            return Err(TokenError::TokenExpired);
        }

        if body.kind != expected {
            return Err(TokenError::TokenKindMismatch {
                expected,
                found: body.kind,
            });
        }

        Ok(body.claims)
    }

    /// Mint an access/refresh pair with the configured lifetimes.
    pub fn issue_pair(&self, claims: Claims) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access_token = self.issue_at(claims.clone(), TokenKind::Access, self.access_ttl, now)?;
        let refresh_token = self.issue_at(claims, TokenKind::Refresh, self.refresh_ttl, now)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Exchange a refresh token for a fresh pair carrying the same identity.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        self.issue_pair(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(Some("test-secret"), Duration::hours(1), Duration::days(7))
    }

    fn alice() -> Claims {
        Claims::new("42")
            .with_roles(["user"])
            .with_permissions(["read"])
            .with_extra("username", "alice")
    }

    #[test]
    fn round_trip_returns_issued_claims() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue_at(alice(), TokenKind::Access, Duration::hours(1), now).unwrap();

        let claims = codec.verify(token.as_str(), TokenKind::Access).unwrap();

        let mut expected = alice();
        expected.issued_at = now.timestamp();
        expected.expires_at = (now + Duration::hours(1)).timestamp();
        assert_eq!(claims, expected);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let issued = Utc::now() - Duration::hours(2);
        let token = codec.issue_at(alice(), TokenKind::Access, Duration::hours(1), issued).unwrap();

        assert_eq!(codec.verify(token.as_str(), TokenKind::Access), Err(TokenError::TokenExpired));
    }

    #[test]
    fn token_is_expired_exactly_at_expiry() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue_at(alice(), TokenKind::Access, Duration::seconds(30), now).unwrap();

        let at_expiry = now + Duration::seconds(30);
        assert_eq!(
            codec.verify_at(token.as_str(), TokenKind::Access, at_expiry),
            Err(TokenError::TokenExpired)
        );
        assert!(codec
            .verify_at(token.as_str(), TokenKind::Access, at_expiry - Duration::seconds(1))
            .is_ok());
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let codec = codec();
        let token = codec.issue(alice(), TokenKind::Refresh, Duration::days(7)).unwrap();

        assert_eq!(
            codec.verify(token.as_str(), TokenKind::Access),
            Err(TokenError::TokenKindMismatch {
                expected: TokenKind::Access,
                found: TokenKind::Refresh,
            })
        );
    }

    #[test]
    fn signature_is_checked_before_expiry() {
        let issuer = TokenCodec::new(Some("other-secret"), Duration::hours(1), Duration::days(7));
        let issued = Utc::now() - Duration::hours(2);
        let token = issuer.issue_at(alice(), TokenKind::Access, Duration::hours(1), issued).unwrap();

        assert_eq!(codec().verify(token.as_str(), TokenKind::Access), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            codec().verify("not-a-token", TokenKind::Access),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn unconfigured_codec_refuses_to_issue() {
        let codec = TokenCodec::new(None, Duration::hours(1), Duration::days(7));
        assert_eq!(
            codec.issue(alice(), TokenKind::Access, Duration::hours(1)),
            Err(TokenError::Config)
        );
        assert!(!TokenCodec::new(Some(""), Duration::hours(1), Duration::days(1)).is_configured());
    }

    #[test]
    fn reserved_extension_claims_are_rejected() {
        let claims = Claims::new("1").with_extra("kind", "access");
        assert_eq!(
            codec().issue(claims, TokenKind::Refresh, Duration::days(1)),
            Err(TokenError::ReservedClaim("kind".to_string()))
        );
    }

    #[test]
    fn refresh_mints_a_new_pair() {
        let codec = codec();
        let pair = codec.issue_pair(alice()).unwrap();
        assert_eq!(pair.token_type, "bearer");
        assert_eq!(pair.expires_in, 3600);

        let renewed = codec.refresh(pair.refresh_token.as_str()).unwrap();
        let claims = codec.verify(renewed.access_token.as_str(), TokenKind::Access).unwrap();
        assert_eq!(claims.subject, "42");
        assert_eq!(claims.extra.get("username"), Some(&Value::from("alice")));

        // an access token cannot be used to refresh
        assert!(matches!(
            codec.refresh(pair.access_token.as_str()),
            Err(TokenError::TokenKindMismatch { .. })
        ));
    }

    #[test]
    fn expiry_past_the_calendar_is_an_error_not_a_panic() {
        let ttl = Duration::try_days(100_000_000).unwrap();
        let codec = TokenCodec::new(Some("test-secret"), Duration::hours(1), ttl);

        assert_eq!(
            codec.issue(alice(), TokenKind::Refresh, ttl),
            Err(TokenError::InvalidLifetime(ttl))
        );
        assert!(matches!(codec.issue_pair(alice()), Err(TokenError::InvalidLifetime(_))));
    }
}
