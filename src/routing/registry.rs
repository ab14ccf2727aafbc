// routing/registry.rs - Statically linked handler modules
//
// A route module is the compiled counterpart of one file in the handler
// tree. It exposes one entry point per HTTP method and optional guards.
// The registry maps tree identifiers (`api/users/[id]`) to modules so that
// discovery never has to execute anything it finds on disk.

use async_trait::async_trait;
use axum::http::Method;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::auth::RouteGuard;
use crate::dispatch::RequestContext;
use crate::error::{ApiError, BuildError};
use crate::middleware::ApiResponse;

/// Order in which a module's entry points enter the dispatch table.
pub const METHOD_ORDER: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

pub(crate) fn method_rank(method: &Method) -> usize {
    METHOD_ORDER
        .iter()
        .position(|m| m == method)
        .unwrap_or(METHOD_ORDER.len())
}

/// An external request handler.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: RequestContext) -> Result<ApiResponse, ApiError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse, ApiError>> + Send + 'static,
{
    async fn call(&self, ctx: RequestContext) -> Result<ApiResponse, ApiError> {
        (self)(ctx).await
    }
}

/// One method's entry point plus its own guard.
#[derive(Clone)]
pub struct EntryPoint {
    pub handler: Arc<dyn Handler>,
    pub guard: RouteGuard,
}

/// Per-method entry points of one handler module.
#[derive(Clone, Default)]
pub struct RouteModule {
    entries: Vec<(Method, EntryPoint)>,
    guard: RouteGuard,
    summary: Option<String>,
}

impl fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteModule")
            .field("methods", &self.entries.iter().map(|(m, _)| m.as_str()).collect::<Vec<_>>())
            .field("guard", &self.guard)
            .field("summary", &self.summary)
            .finish()
    }
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`, replacing an earlier one.
    pub fn on(mut self, method: Method, handler: impl Handler) -> Self {
        let entry = EntryPoint {
            handler: Arc::new(handler),
            guard: RouteGuard::default(),
        };
        match self.entries.iter_mut().find(|(m, _)| *m == method) {
            Some(existing) => existing.1 = entry,
            None => self.entries.push((method, entry)),
        }
        self
    }

    pub fn get(self, handler: impl Handler) -> Self {
        self.on(Method::GET, handler)
    }

    pub fn post(self, handler: impl Handler) -> Self {
        self.on(Method::POST, handler)
    }

    pub fn put(self, handler: impl Handler) -> Self {
        self.on(Method::PUT, handler)
    }

    pub fn patch(self, handler: impl Handler) -> Self {
        self.on(Method::PATCH, handler)
    }

    pub fn delete(self, handler: impl Handler) -> Self {
        self.on(Method::DELETE, handler)
    }

    pub fn head(self, handler: impl Handler) -> Self {
        self.on(Method::HEAD, handler)
    }

    pub fn options(self, handler: impl Handler) -> Self {
        self.on(Method::OPTIONS, handler)
    }

    /// Roles every entry point of this module demands.
    pub fn require_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard = self.guard.merge(&RouteGuard::roles(roles));
        self
    }

    /// Permissions every entry point of this module demands.
    pub fn require_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard = self.guard.merge(&RouteGuard::permissions(permissions));
        self
    }

    /// Extra guard for a single method, on top of the module guard.
    /// Has no effect if the method has no entry point yet.
    pub fn guard_method(mut self, method: Method, guard: RouteGuard) -> Self {
        if let Some((_, entry)) = self.entries.iter_mut().find(|(m, _)| *m == method) {
            entry.guard = entry.guard.merge(&guard);
        }
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry points in [`METHOD_ORDER`], extension methods last by name,
    /// each with the module guard folded in.
    pub fn entry_points(&self) -> Vec<(Method, EntryPoint)> {
        let mut entries: Vec<(Method, EntryPoint)> = self
            .entries
            .iter()
            .map(|(method, entry)| {
                (
                    method.clone(),
                    EntryPoint {
                        handler: entry.handler.clone(),
                        guard: self.guard.merge(&entry.guard),
                    },
                )
            })
            .collect();
        entries.sort_by(|(a, _), (b, _)| {
            method_rank(a)
                .cmp(&method_rank(b))
                .then_with(|| a.as_str().cmp(b.as_str()))
        });
        entries
    }
}

/// Identifier → module map, resolved against the discovered tree.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    modules: BTreeMap<String, RouteModule>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers are tree paths without extension, `/`-separated
    /// (`index`, `api/users/[id]`). Registering one twice is an error.
    pub fn register(mut self, identifier: &str, module: RouteModule) -> Result<Self, BuildError> {
        let identifier = normalize_identifier(identifier)?;
        if self.modules.contains_key(&identifier) {
            return Err(BuildError::config(format!(
                "handler module '{}' is registered twice",
                identifier
            )));
        }
        self.modules.insert(identifier, module);
        Ok(self)
    }

    pub fn get(&self, identifier: &str) -> Option<&RouteModule> {
        self.modules.get(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn normalize_identifier(identifier: &str) -> Result<String, BuildError> {
    let trimmed = identifier.trim_matches('/');
    if trimmed.is_empty() {
        return Err(BuildError::config("handler module identifier is empty"));
    }
    if trimmed.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(BuildError::config(format!(
            "handler module identifier '{}' has an empty or relative component",
            identifier
        )));
    }
    Ok(trimmed.to_string())
}
