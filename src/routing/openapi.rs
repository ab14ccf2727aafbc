// routing/openapi.rs - OpenAPI document derived from the dispatch table

use axum::http::Method;
use serde_json::{json, Map, Value};

use super::table::{DispatchTable, RouteEntry};
use crate::auth::AccessPolicy;

const BEARER_SCHEME: &str = "bearerAuth";

/// Describe every entry of `table`. Operations on paths that need a token
/// carry the bearer security requirement.
pub fn document(table: &DispatchTable, policy: &AccessPolicy, title: &str, version: &str) -> Value {
    let mut paths = Map::new();

    for entry in table.entries() {
        let item = paths
            .entry(entry.pattern.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(operations) = item {
            operations.insert(entry.method.as_str().to_ascii_lowercase(), operation(entry, policy));
        }
    }

    json!({
        "openapi": "3.1.0",
        "info": {
            "title": title,
            "version": version
        },
        "paths": paths,
        "components": {
            "securitySchemes": {
                BEARER_SCHEME: {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT"
                }
            }
        }
    })
}

fn operation(entry: &RouteEntry, policy: &AccessPolicy) -> Value {
    let pattern = entry.pattern.to_string();
    let secured = policy.requires_token(&pattern) || !entry.guard.is_empty();

    let parameters: Vec<Value> = entry
        .pattern
        .param_names()
        .map(|name| {
            json!({
                "name": name,
                "in": "path",
                "required": true,
                "schema": { "type": "string" }
            })
        })
        .collect();

    let mut responses = Map::new();
    responses.insert("200".to_string(), json!({ "description": "Successful response" }));
    if secured {
        responses.insert("401".to_string(), json!({ "description": "Missing or invalid credentials" }));
    }
    if !entry.guard.is_empty() {
        responses.insert("403".to_string(), json!({ "description": "Insufficient roles or permissions" }));
    }
    if matches!(entry.method, Method::POST | Method::PUT | Method::PATCH) {
        responses.insert("422".to_string(), json!({ "description": "Malformed or invalid body" }));
    }

    let mut op = json!({
        "operationId": operation_id(entry),
        "parameters": parameters,
        "responses": responses
    });
    if let Some(summary) = &entry.summary {
        op["summary"] = json!(summary);
    }
    if secured {
        op["security"] = json!([{ BEARER_SCHEME: [] }]);
    }
    if !entry.guard.roles.is_empty() {
        op["x-required-roles"] = json!(entry.guard.roles);
    }
    if !entry.guard.permissions.is_empty() {
        op["x-required-permissions"] = json!(entry.guard.permissions);
    }
    op
}

/// `GET /api/users/{id}` → `get_api_users_id`; the root is `get_index`.
fn operation_id(entry: &RouteEntry) -> String {
    let mut id = entry.method.as_str().to_ascii_lowercase();
    let path: Vec<String> = entry
        .pattern
        .segments()
        .iter()
        .map(|segment| {
            segment
                .to_string()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
                .trim_matches('_')
                .to_string()
        })
        .collect();
    if path.is_empty() {
        id.push_str("_index");
    } else {
        for part in path {
            id.push('_');
            id.push_str(&part);
        }
    }
    id
}
