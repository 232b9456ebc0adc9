//! ChatOps bot - deployment orchestration over chat
//!
//! Serves the chat transport, health and metrics endpoints and runs the
//! scheduled health poll and daily report until interrupted.

use anyhow::Result;
use chatops_bot::{api, app, config::BotConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BOT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting chatops-bot");

    let config = BotConfig::load()?;
    info!(
        bot_name = %config.bot_name,
        application = %config.chatops.application,
        "Bot configured"
    );

    let backend = app::select_backend(&config)?;
    let sink = app::select_sink(&config)?;
    let components = app::build(&config, backend, sink).await;

    let backend_name = format!("{:?}", config.backend.kind).to_lowercase();
    components.logger.log_startup(BOT_VERSION, &backend_name);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let job_handles = components.scheduler.spawn(&shutdown_tx)?;

    let app_state = Arc::new(api::AppState::new(
        Arc::clone(&components.orchestrator),
        components.health.clone(),
    ));

    // Mark bot as ready after initialization
    components.health.set_ready(true).await;

    let mut api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, async move {
        let _ = api_shutdown.recv().await;
    }));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    components.logger.log_shutdown("SIGINT received");
    components.health.set_ready(false).await;
    let _ = shutdown_tx.send(());

    for handle in job_handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }
    match api_handle.await {
        Ok(Err(e)) => error!(error = %e, "API server failed"),
        Err(e) => error!(error = %e, "API server task ended abnormally"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}
