use std::sync::Arc;

use anyhow::Context;
use invsync_api::app::{self, services};
use invsync_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    invsync_observability::init();

    let config = AppConfig::from_env()?;
    let queue = services::build_queue(&config).await?;
    let orchestrator = services::start_orchestrator(&config, queue.clone())?;

    let app = app::build_app(Arc::new(app::AppServices::new(queue)));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    orchestrator.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
