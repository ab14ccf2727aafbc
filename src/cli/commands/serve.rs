use anyhow::Context;
use std::sync::Arc;

use crate::app::{build_router, AppContext};
use crate::cli::utils::load_config;

pub async fn handle(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting pathgate in {:?} mode", config.environment);

    let app = Arc::new(AppContext::from_config(&config).context("failed to assemble application")?);
    tracing::info!("{} routes loaded", app.table.len());

    let router = build_router(app, &config);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
