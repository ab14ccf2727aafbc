// routing/table.rs - Dispatch table construction and path matching

use axum::http::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::registry::{method_rank, Handler, HandlerRegistry};
use super::segment::{split_request_path, PathParams, PathPattern, PathSegment};
use super::tree::{NodeKind, RouteNode};
use crate::auth::RouteGuard;
use crate::error::{ApiError, BuildError};

/// `(method, pattern) → handler`, plus the guard overrides of its module.
#[derive(Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: Arc<dyn Handler>,
    pub guard: RouteGuard,
    /// Module identifier that produced this entry
    pub source: String,
    pub summary: Option<String>,
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.to_string())
            .field("guard", &self.guard)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route matches {0}")]
    RouteNotFound(String),

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::RouteNotFound(path) => ApiError::route_not_found(&path),
            RouteError::MethodNotAllowed { method, path, allowed } => {
                ApiError::method_not_allowed(&method, &path, allowed)
            }
        }
    }
}

/// A successful match.
#[derive(Debug)]
pub struct ResolvedRoute<'a> {
    pub entry: &'a RouteEntry,
    pub params: PathParams,
}

/// Immutable ordered table built once at startup.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: Vec<RouteEntry>,
}

impl DispatchTable {
    /// Depth-first walk of `tree`, resolving each module leaf against
    /// `registry`. Two entries with the same method and pattern shape fail
    /// the build.
    pub fn build(tree: &RouteNode, registry: &HandlerRegistry) -> Result<Self, BuildError> {
        let mut builder = TableBuilder {
            registry,
            entries: Vec::new(),
            seen: HashMap::new(),
        };
        builder.walk_children(tree, &PathPattern::root())?;

        let table = Self {
            entries: builder.entries,
        };
        for entry in &table.entries {
            tracing::info!("route {:<7} {} -> {}", entry.method.as_str(), entry.pattern, entry.source);
        }
        Ok(table)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `method path`. The first entry in declaration order whose
    /// pattern fully matches and whose method agrees wins. `HEAD` falls back
    /// to `GET` when no explicit `HEAD` entry matches.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<ResolvedRoute<'_>, RouteError> {
        let not_found = || RouteError::RouteNotFound(path.to_string());
        let segments = split_request_path(path).ok_or_else(not_found)?;

        let mut head_fallback: Option<ResolvedRoute<'_>> = None;
        let mut allowed: Vec<Method> = Vec::new();

        for entry in &self.entries {
            let Some(params) = entry.pattern.match_segments(&segments) else {
                continue;
            };

            if entry.method == *method {
                return Ok(ResolvedRoute { entry, params });
            }

            if *method == Method::HEAD && entry.method == Method::GET && head_fallback.is_none() {
                head_fallback = Some(ResolvedRoute { entry, params });
            }

            if !allowed.contains(&entry.method) {
                allowed.push(entry.method.clone());
            }
        }

        if let Some(resolved) = head_fallback {
            return Ok(resolved);
        }

        if allowed.is_empty() {
            return Err(not_found());
        }

        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        allowed.sort_by(|a, b| method_rank(a).cmp(&method_rank(b)).then_with(|| a.as_str().cmp(b.as_str())));

        Err(RouteError::MethodNotAllowed {
            method: method.clone(),
            path: path.to_string(),
            allowed,
        })
    }
}

struct TableBuilder<'a> {
    registry: &'a HandlerRegistry,
    entries: Vec<RouteEntry>,
    /// (method, shape key) → source that claimed it first
    seen: HashMap<(Method, String), String>,
}

impl<'a> TableBuilder<'a> {
    fn walk_children(&mut self, dir: &RouteNode, prefix: &PathPattern) -> Result<(), BuildError> {
        for child in &dir.children {
            let pattern = match PathSegment::from_name(&child.name)? {
                Some(segment) => prefix.child(segment)?,
                None => prefix.clone(),
            };

            match child.kind {
                NodeKind::Directory => self.walk_children(child, &pattern)?,
                NodeKind::Module => self.add_module(child, pattern)?,
            }
        }
        Ok(())
    }

    fn add_module(&mut self, node: &RouteNode, pattern: PathPattern) -> Result<(), BuildError> {
        let module = self.registry.get(&node.identifier).ok_or_else(|| {
            BuildError::config(format!(
                "handler module '{}' has no registered implementation",
                node.identifier
            ))
        })?;

        if module.is_empty() {
            tracing::warn!("handler module '{}' exposes no methods", node.identifier);
        }

        for (method, entry_point) in module.entry_points() {
            let key = (method.clone(), pattern.shape_key());
            if let Some(first) = self.seen.get(&key) {
                return Err(BuildError::RouteCollision {
                    method,
                    pattern: pattern.to_string(),
                    first: first.clone(),
                    second: node.identifier.clone(),
                });
            }
            self.seen.insert(key, node.identifier.clone());

            self.entries.push(RouteEntry {
                method,
                pattern: pattern.clone(),
                handler: entry_point.handler,
                guard: entry_point.guard,
                source: node.identifier.clone(),
                summary: module.summary_text().map(str::to_string),
            });
        }
        Ok(())
    }
}
