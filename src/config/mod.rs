use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::auth::DefaultAccess;
use crate::error::BuildError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub routes: RoutesConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub max_request_size_bytes: usize,
    pub enable_request_logging: bool,
    /// Where the generated OpenAPI document is served; `None` disables it.
    pub openapi_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    pub access_token_ttl_minutes: u64,
    pub refresh_token_ttl_days: u64,
    pub bcrypt_cost: u32,
    pub protected_paths: Vec<String>,
    pub excluded_paths: Vec<String>,
    /// Must be chosen explicitly, there is no implied default.
    pub default_access: Option<DefaultAccess>,
    pub cors_origins: Vec<String>,
    pub security_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    /// Handler tree on disk. Without one, the tree is derived from the
    /// compiled-in registry.
    pub routes_dir: Option<PathBuf>,
    pub module_extension: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, BuildError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading variables through
    /// `lookup`, so callers and tests need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, BuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = lookup("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("SERVER_PORT").or_else(|| lookup("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // API overrides
        if let Some(v) = lookup("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Some(v) = lookup("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Some(v) = lookup("API_OPENAPI_PATH") {
            self.api.openapi_path = Some(v).filter(|p| !p.trim().is_empty());
        }

        // Security overrides
        if let Some(v) = lookup("SECURITY_JWT_SECRET").or_else(|| lookup("JWT_SECRET")) {
            self.security.jwt_secret = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("SECURITY_ACCESS_TOKEN_TTL_MINUTES") {
            self.security.access_token_ttl_minutes = v.parse().unwrap_or(self.security.access_token_ttl_minutes);
        }
        if let Some(v) = lookup("SECURITY_REFRESH_TOKEN_TTL_DAYS") {
            self.security.refresh_token_ttl_days = v.parse().unwrap_or(self.security.refresh_token_ttl_days);
        }
        if let Some(v) = lookup("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        if let Some(v) = lookup("SECURITY_PROTECTED_PATHS") {
            self.security.protected_paths = split_list(&v);
        }
        if let Some(v) = lookup("SECURITY_EXCLUDED_PATHS") {
            self.security.excluded_paths = split_list(&v);
        }
        if let Some(v) = lookup("SECURITY_DEFAULT_ACCESS") {
            // An unknown value is fatal rather than silently ignored
            self.security.default_access = Some(v.parse()?);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Some(v) = lookup("SECURITY_HEADERS") {
            self.security.security_headers = v.parse().unwrap_or(self.security.security_headers);
        }

        // Routes overrides
        if let Some(v) = lookup("ROUTES_DIR") {
            self.routes.routes_dir = Some(PathBuf::from(v)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(v) = lookup("ROUTES_MODULE_EXTENSION") {
            self.routes.module_extension = v.trim_start_matches('.').to_string();
        }

        Ok(self)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            api: ApiConfig {
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                enable_request_logging: true,
                openapi_path: Some("/openapi.json".to_string()),
            },
            security: SecurityConfig {
                // CORS stays permissive in development
                cors_origins: Vec::new(),
                ..SecurityConfig::base()
            },
            routes: RoutesConfig::base(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            api: ApiConfig {
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                enable_request_logging: true,
                openapi_path: Some("/openapi.json".to_string()),
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                ..SecurityConfig::base()
            },
            routes: RoutesConfig::base(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            api: ApiConfig {
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
                enable_request_logging: false,
                openapi_path: None,
            },
            security: SecurityConfig {
                access_token_ttl_minutes: 15,
                refresh_token_ttl_days: 1,
                cors_origins: vec!["https://app.example.com".to_string()],
                ..SecurityConfig::base()
            },
            routes: RoutesConfig::base(),
        }
    }
}

impl SecurityConfig {
    fn base() -> Self {
        Self {
            jwt_secret: None,
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 7,
            bcrypt_cost: 12,
            protected_paths: vec!["/api".to_string()],
            excluded_paths: [
                "/",
                "/health",
                "/openapi.json",
                "/api/auth/login",
                "/api/auth/refresh",
                "/api/public",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            default_access: None,
            cors_origins: Vec::new(),
            security_headers: true,
        }
    }
}

impl RoutesConfig {
    fn base() -> Self {
        Self {
            routes_dir: None,
            module_extension: "rs".to_string(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
