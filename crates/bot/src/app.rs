//! Component wiring shared by the binary and the integration tests

use crate::config::{BackendKind, BotConfig};
use anyhow::Result;
use bot_lib::{
    health::{components, HealthRegistry},
    observability::{BotMetrics, StructuredLogger},
    Aggregator, HttpBackend, InMemoryBackend, InfraBackend, InstrumentedBackend, LogSink,
    NotificationSink, Notifier, Orchestrator, Scheduler, SimulatedMetrics, WebhookSink,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything the bot runs, built once at startup
pub struct Components {
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
    pub health: HealthRegistry,
    pub metrics: BotMetrics,
    pub logger: StructuredLogger,
}

/// Backend selected by configuration
pub fn select_backend(config: &BotConfig) -> Result<Arc<dyn InfraBackend>> {
    let backend: Arc<dyn InfraBackend> = match config.backend.kind {
        BackendKind::Http => {
            info!(endpoint = %config.backend.endpoint, "Using HTTP backend");
            Arc::new(HttpBackend::new(
                config.backend.http_config(),
                Arc::new(config.chatops.clone()),
            )?)
        }
        BackendKind::Memory => {
            info!("Using in-memory sandbox backend");
            Arc::new(InMemoryBackend::new())
        }
    };
    Ok(backend)
}

/// Notification sink selected by configuration
pub fn select_sink(config: &BotConfig) -> Result<Arc<dyn NotificationSink>> {
    let sink: Arc<dyn NotificationSink> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(
            url,
            Duration::from_secs(config.notifications.timeout_secs),
        )?),
        None => {
            info!("No notification webhook configured, notifications are logged only");
            Arc::new(LogSink)
        }
    };
    Ok(sink)
}

/// Wire the orchestrator and scheduler around `backend` and `sink`
pub async fn build(
    config: &BotConfig,
    backend: Arc<dyn InfraBackend>,
    sink: Arc<dyn NotificationSink>,
) -> Components {
    let health = HealthRegistry::new();
    health.register(components::BACKEND).await;
    health.register(components::NOTIFIER).await;
    health.register(components::SCHEDULER).await;

    let metrics = BotMetrics::new();
    let logger = StructuredLogger::new(&config.bot_name);
    let chatops = Arc::new(config.chatops.clone());

    let backend: Arc<dyn InfraBackend> =
        Arc::new(InstrumentedBackend::new(backend, metrics.clone()));
    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&backend),
        Arc::new(SimulatedMetrics::new()),
        Arc::clone(&chatops),
    ));
    let notifier = Arc::new(Notifier::new(
        sink,
        chatops.channels.clone(),
        metrics.clone(),
        logger.clone(),
        health.clone(),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&chatops),
        backend,
        Arc::clone(&aggregator),
        Arc::clone(&notifier),
        metrics.clone(),
        logger.clone(),
        health.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        chatops,
        aggregator,
        notifier,
        metrics.clone(),
        logger.clone(),
        health.clone(),
    ));

    Components {
        orchestrator,
        scheduler,
        health,
        metrics,
        logger,
    }
}
