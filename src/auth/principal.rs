use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::token::Claims;

/// Authenticated identity attached to a single request after its token
/// verified. Never outlives the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    /// Extension claims carried by the token (username, email, ...)
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.subject,
            roles: claims.roles,
            permissions: claims.permissions,
            attributes: claims.extra,
        }
    }
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// String-valued extension claim, e.g. `username`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Role and permission requirements layered after authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

/// What a principal lacked when a guard rejected it. Operator-facing only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardShortfall {
    pub missing_roles: Vec<String>,
    pub missing_permissions: Vec<String>,
}

impl std::fmt::Display for GuardShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "missing roles [{}], missing permissions [{}]",
            self.missing_roles.join(", "),
            self.missing_permissions.join(", ")
        )
    }
}

impl RouteGuard {
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: BTreeSet::new(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.permissions.is_empty()
    }

    /// Union of both requirement sets.
    pub fn merge(&self, other: &RouteGuard) -> RouteGuard {
        RouteGuard {
            roles: self.roles.union(&other.roles).cloned().collect(),
            permissions: self.permissions.union(&other.permissions).cloned().collect(),
        }
    }

    /// The principal's sets must be supersets of the required sets.
    pub fn check(&self, principal: &Principal) -> Result<(), GuardShortfall> {
        let missing_roles: Vec<String> = self.roles.difference(&principal.roles).cloned().collect();
        let missing_permissions: Vec<String> = self
            .permissions
            .difference(&principal.permissions)
            .cloned()
            .collect();

        if missing_roles.is_empty() && missing_permissions.is_empty() {
            Ok(())
        } else {
            Err(GuardShortfall {
                missing_roles,
                missing_permissions,
            })
        }
    }
}
