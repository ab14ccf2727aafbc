use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::RequestContext;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routes::DemoUsers;
use crate::routing::RouteModule;

pub fn module(users: Arc<DemoUsers>, started: Instant) -> RouteModule {
    RouteModule::new()
        .get(move |_ctx: RequestContext| {
            let users = users.clone();
            async move {
                let mut per_role: BTreeMap<&str, usize> = BTreeMap::new();
                for user in users.iter() {
                    for role in &user.roles {
                        *per_role.entry(role.as_str()).or_default() += 1;
                    }
                }

                Ok::<_, ApiError>(ApiResponse::success(json!({
                    "users": users.len(),
                    "active_users": users.iter().filter(|u| u.active).count(),
                    "users_per_role": per_role,
                    "uptime_seconds": started.elapsed().as_secs()
                })))
            }
        })
        .require_roles(["admin"])
        .require_permissions(["read"])
        .summary("Administrative statistics")
}
