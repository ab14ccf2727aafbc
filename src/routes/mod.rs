// routes/mod.rs - Built-in handler tree
//
// Every other file below this directory is one handler module; its path
// relative to here is its route. Only this file may hold shared code, the
// scanner ignores `mod.rs`.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AuthServices, Claims, CredentialVerifier};
use crate::error::BuildError;
use crate::routing::HandlerRegistry;

mod health;
mod index;

#[path = "api/admin/stats.rs"]
mod admin_stats;
#[path = "api/auth/login.rs"]
mod auth_login;
#[path = "api/auth/refresh.rs"]
mod auth_refresh;
#[path = "api/protected.rs"]
mod protected;
#[path = "api/public.rs"]
mod public;
#[path = "api/users/[id].rs"]
mod users_id;

/// Registry of the built-in modules, keyed by their tree identifiers.
pub fn registry(auth: &AuthServices) -> Result<HandlerRegistry, BuildError> {
    let users = Arc::new(DemoUsers::seed(&auth.credentials)?);
    let started = Instant::now();

    HandlerRegistry::new()
        .register("index", index::module())?
        .register("health", health::module(started))?
        .register("api/public", public::module())?
        .register("api/protected", protected::module())?
        .register("api/auth/login", auth_login::module(auth.clone(), users.clone()))?
        .register("api/auth/refresh", auth_refresh::module(auth.clone()))?
        .register("api/users/[id]", users_id::module(users.clone()))?
        .register("api/admin/stats", admin_stats::module(users, started))
}

/// In-memory demo account. The password is only ever kept as a bcrypt digest.
#[derive(Debug, Clone, Serialize)]
pub struct DemoUser {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub active: bool,
}

impl DemoUser {
    /// Identity carried in tokens minted for this account.
    pub fn claims(&self) -> Claims {
        Claims::new(&self.id)
            .with_roles(self.roles.iter().cloned())
            .with_permissions(self.permissions.iter().cloned())
            .with_extra("username", self.username.clone())
            .with_extra("email", self.email.clone())
    }
}

#[derive(Debug, Clone)]
pub struct DemoUsers {
    users: Vec<DemoUser>,
    /// Digest at the accounts' cost; unknown usernames are verified against it
    decoy_hash: String,
}

impl DemoUsers {
    /// `admin`/`admin123` and `user`/`user123`, hashed at startup.
    pub fn seed(credentials: &CredentialVerifier) -> Result<Self, BuildError> {
        let accounts: [(&str, &str, &str, &[&str], &[&str]); 2] = [
            ("1", "admin", "admin123", &["admin", "user"], &["read", "write", "delete"]),
            ("2", "user", "user123", &["user"], &["read"]),
        ];

        let mut users = Vec::with_capacity(accounts.len());
        for (id, username, password, roles, permissions) in accounts {
            let password_hash = credentials
                .hash(password)
                .map_err(|e| BuildError::config(format!("failed to seed demo user '{}': {}", username, e)))?;
            users.push(DemoUser {
                id: id.to_string(),
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash,
                roles: roles.iter().map(|r| r.to_string()).collect(),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
                active: true,
            });
        }
        let decoy_hash = credentials
            .hash("decoy password for unknown accounts")
            .map_err(|e| BuildError::config(format!("failed to seed decoy digest: {}", e)))?;

        Ok(Self { users, decoy_hash })
    }

    pub fn decoy_hash(&self) -> &str {
        &self.decoy_hash
    }

    pub fn by_username(&self, username: &str) -> Option<&DemoUser> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn by_id(&self, id: &str) -> Option<&DemoUser> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DemoUser> {
        self.users.iter()
    }
}
