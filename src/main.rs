use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use schoolbus_api::app::app;
use schoolbus_api::config;
use schoolbus_api::database::{PgSourceFactory, PgTenantDirectory, SourceRegistry};
use schoolbus_api::tenancy::TenantRouting;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, TENANT_DEFAULT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting schoolbus API in {:?} mode", config.environment);

    // Misconfigured resolution is a startup failure, never a request-time one
    config.tenancy.validate().context("invalid tenancy configuration")?;

    let registry = Arc::new(SourceRegistry::new(
        PgSourceFactory,
        config.database.default_profile.clone(),
    ));
    // Connects lazily: a master outage shows up on /health, not as a failed boot
    let primary = registry
        .primary_source()
        .await
        .context("invalid master database configuration")?;
    let directory = Arc::new(PgTenantDirectory::new(primary));
    let routing = Arc::new(TenantRouting::from_config(&config.tenancy, directory, registry.clone())?);

    if config.tenancy.warm_pools {
        match routing.warm_up().await {
            Ok(report) => tracing::info!(ready = ?report.ready, failed = ?report.failed, "tenant pools warmed"),
            Err(e) => tracing::warn!(error = %e, "tenant pool warm-up skipped"),
        }
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("schoolbus API listening on http://{}", bind_addr);

    axum::serve(listener, app(routing))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    registry.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
