use anyhow::Context;
use serde_json::{json, Value};

use crate::app::build_table;
use crate::auth::AuthServices;
use crate::cli::{utils::load_config, OutputFormat};
use crate::routing::{DispatchTable, RouteEntry};

/// Runs without a signing key so the table can be inspected anywhere.
pub fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config()?;
    let auth = AuthServices::from_config(&config.security)?;
    let registry = crate::routes::registry(&auth)?;
    let table = build_table(&config.routes, &registry).context("failed to build dispatch table")?;

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listing(&table))?);
        }
        OutputFormat::Text => {
            for entry in table.entries() {
                println!(
                    "{:<7} {:<24} {:<20} {}",
                    entry.method.as_str(),
                    entry.pattern.to_string(),
                    entry.source,
                    describe_guard(entry)
                );
            }
        }
    }
    Ok(())
}

fn listing(table: &DispatchTable) -> Value {
    let routes: Vec<Value> = table
        .entries()
        .iter()
        .map(|entry| {
            json!({
                "method": entry.method.as_str(),
                "pattern": entry.pattern.to_string(),
                "source": entry.source,
                "roles": entry.guard.roles,
                "permissions": entry.guard.permissions,
                "summary": entry.summary
            })
        })
        .collect();
    json!({ "routes": routes })
}

fn describe_guard(entry: &RouteEntry) -> String {
    let mut parts = Vec::new();
    if !entry.guard.roles.is_empty() {
        parts.push(format!("roles={}", entry.guard.roles.iter().cloned().collect::<Vec<_>>().join(",")));
    }
    if !entry.guard.permissions.is_empty() {
        parts.push(format!(
            "permissions={}",
            entry.guard.permissions.iter().cloned().collect::<Vec<_>>().join(",")
        ));
    }
    parts.join(" ")
}
