//! PushCI daemon binary.

use anyhow::{Context, Result};
use clap::Parser;
use pushcid::{router, Config};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let level = if config.verbose { Level::DEBUG } else { Level::INFO };
    pushci_core::init_tracing(config.json, level);

    let state = config.build_state()?;
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(
        listen = %config.listen,
        workspace_root = %config.workspace_root.display(),
        archive_root = %config.archive_root.display(),
        "pushcid started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.drain().await;
    info!("pushcid stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
