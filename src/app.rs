// app.rs - Application assembly
//
// Config + registry → handler tree → dispatch table → AppContext, then the
// axum router wrapping the gate and the dispatch fallback.

use axum::{
    extract::State,
    http::{Method, Uri},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{AccessPolicy, AuthServices};
use crate::config::{AppConfig, RoutesConfig};
use crate::dispatch::dispatch;
use crate::error::{ApiError, BuildError};
use crate::middleware::{apply_security_headers, authorization_gate, cors_layer};
use crate::routing::{openapi, DispatchTable, HandlerRegistry, RouteNode};

#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_body_bytes: usize,
}

/// Read-only state shared by every request.
#[derive(Debug)]
pub struct AppContext {
    pub table: DispatchTable,
    pub policy: AccessPolicy,
    pub auth: AuthServices,
    pub limits: RequestLimits,
    pub openapi: Value,
}

impl AppContext {
    /// Assemble from configuration with the built-in route modules.
    pub fn from_config(config: &AppConfig) -> Result<Self, BuildError> {
        let auth = AuthServices::from_config(&config.security)?;
        let registry = crate::routes::registry(&auth)?;
        Self::assemble(config, &registry, auth)
    }

    /// Any failure here means the process must not serve traffic.
    pub fn assemble(
        config: &AppConfig,
        registry: &HandlerRegistry,
        auth: AuthServices,
    ) -> Result<Self, BuildError> {
        if !auth.tokens.is_configured() {
            return Err(BuildError::config(
                "a token signing key is required (set SECURITY_JWT_SECRET)",
            ));
        }

        let policy = AccessPolicy::from_specs(
            &config.security.protected_paths,
            &config.security.excluded_paths,
            config.security.default_access,
        )?;
        tracing::info!(
            "access policy: protected [{}], excluded [{}], default {:?}",
            join_rules(policy.protected()),
            join_rules(policy.excluded()),
            policy.default_access()
        );

        let table = build_table(&config.routes, registry)?;
        let openapi = openapi::document(&table, &policy, "pathgate", env!("CARGO_PKG_VERSION"));

        Ok(Self {
            table,
            policy,
            auth,
            limits: RequestLimits {
                max_body_bytes: config.api.max_request_size_bytes,
            },
            openapi,
        })
    }
}

fn join_rules(rules: &[crate::auth::PathRule]) -> String {
    rules.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Discover the handler tree and build the dispatch table for `registry`.
pub fn build_table(routes: &RoutesConfig, registry: &HandlerRegistry) -> Result<DispatchTable, BuildError> {
    let tree = match &routes.routes_dir {
        Some(dir) => {
            tracing::info!("scanning handler tree at {}", dir.display());
            let tree = RouteNode::scan(dir, &routes.module_extension)?;

            let on_disk: BTreeSet<&str> = tree.module_identifiers().into_iter().collect();
            for identifier in registry.identifiers().filter(|id| !on_disk.contains(id)) {
                tracing::warn!("handler module '{}' is registered but not present on disk", identifier);
            }
            tree
        }
        None => RouteNode::from_registry(registry)?,
    };

    DispatchTable::build(&tree, registry)
}

/// Router with every layer in place. Outermost first: trace, CORS,
/// security headers, authorization gate, then the dispatch fallback.
pub fn build_router(app: Arc<AppContext>, config: &AppConfig) -> Router {
    let mut router: Router<Arc<AppContext>> = Router::new();

    if let Some(path) = &config.api.openapi_path {
        router = router.route(path, get(serve_openapi).fallback(openapi_method_not_allowed));
    }

    let router = router
        .fallback(dispatch)
        .layer(middleware::from_fn_with_state(app.clone(), authorization_gate));

    let router = if config.security.security_headers {
        apply_security_headers(router)
    } else {
        router
    };

    let router = router.layer(cors_layer(&config.security.cors_origins));

    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(app)
}

async fn serve_openapi(State(app): State<Arc<AppContext>>) -> Json<Value> {
    Json(app.openapi.clone())
}

async fn openapi_method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::method_not_allowed(&method, uri.path(), vec![Method::GET, Method::HEAD])
}
