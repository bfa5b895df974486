use std::sync::Arc;

use anyhow::Context;

use synopsi_api::app::{build_app, services};
use synopsi_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    synopsi_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.worker.callback_token.is_none() {
        tracing::warn!("WORKER_CALLBACK_TOKEN not set; worker callbacks are unauthenticated");
    }

    let services = Arc::new(services::build_services(&config).await?);
    let sweeps = services.spawn_sweeps(&config)?;

    let app = build_app(services.clone(), config.worker.callback_token.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for sweep in sweeps {
        let name = sweep.name();
        sweep.shutdown().await;
        tracing::info!(sweep = name, "sweep stopped");
    }
    services.jobs.wait_for_dispatches().await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
