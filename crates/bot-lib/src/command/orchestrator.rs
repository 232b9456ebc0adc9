//! Command orchestration
//!
//! Each chat message runs through `Received -> Validated -> Dispatched ->
//! {Succeeded, Failed}`. Validation failures stop before any backend call.
//! Successful commands reply to the requester and notify their topic
//! channel; failed commands only reply to the requester.

use super::parser::{Command, CommandKind, CommandParser, Parsed};
use crate::aggregator::Aggregator;
use crate::backend::InfraBackend;
use crate::config::ChatOpsConfig;
use crate::error::CommandError;
use crate::format;
use crate::health::{components, HealthRegistry};
use crate::models::CanaryRequest;
use crate::notify::{Notifier, Topic};
use crate::observability::{BotMetrics, StructuredLogger};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Reply channel back to whoever sent the command
#[async_trait]
pub trait Reply: Send + Sync {
    async fn reply(&self, text: &str);
}

/// A chat message addressed to the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user: String,
    pub text: String,
}

impl ChatRequest {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Succeeded,
    Failed,
    /// Validation failed, nothing was dispatched
    Rejected,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Succeeded => "succeeded",
            CommandStatus::Failed => "failed",
            CommandStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub kind: CommandKind,
    pub status: CommandStatus,
}

/// Desired capacity for promoting to `percentage` of `base_capacity`
pub fn promoted_capacity(base_capacity: u32, percentage: u32) -> u32 {
    let scaled = u64::from(base_capacity) * u64::from(percentage);
    scaled.div_ceil(100) as u32
}

pub struct Orchestrator {
    config: Arc<ChatOpsConfig>,
    parser: CommandParser,
    backend: Arc<dyn InfraBackend>,
    aggregator: Arc<Aggregator>,
    notifier: Arc<Notifier>,
    metrics: BotMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl Orchestrator {
    pub fn new(
        config: Arc<ChatOpsConfig>,
        backend: Arc<dyn InfraBackend>,
        aggregator: Arc<Aggregator>,
        notifier: Arc<Notifier>,
        metrics: BotMetrics,
        logger: StructuredLogger,
        health: HealthRegistry,
    ) -> Self {
        Self {
            parser: CommandParser::new(Arc::clone(&config)),
            config,
            backend,
            aggregator,
            notifier,
            metrics,
            logger,
            health,
        }
    }

    /// Handle one chat message.
    ///
    /// Returns `None` when the text is not a command. Never fails: every
    /// error ends up as a reply to the requester.
    pub async fn handle(&self, request: &ChatRequest, reply: &dyn Reply) -> Option<CommandOutcome> {
        let parsed = self.parser.parse(&request.text)?;

        let (kind, status, detail) = match parsed {
            Parsed::Rejected { kind, error } => {
                reply.reply(&format::rejected(&error)).await;
                (kind, CommandStatus::Rejected, error.to_string())
            }
            Parsed::Command(command) => {
                let kind = command.kind();
                debug!(user = %request.user, command = %kind, "Dispatching command");
                match self.dispatch(command, &request.user, reply).await {
                    Ok(detail) => (kind, CommandStatus::Succeeded, detail),
                    Err(error) => {
                        reply
                            .reply(&format::failure(failure_context(kind), &error))
                            .await;
                        (kind, CommandStatus::Failed, error.to_string())
                    }
                }
            }
        };

        self.metrics.inc_command(kind.as_str(), status.as_str());
        self.logger
            .log_command(&request.user, kind.as_str(), status.as_str(), &detail);
        Some(CommandOutcome { kind, status })
    }

    async fn dispatch(
        &self,
        command: Command,
        user: &str,
        reply: &dyn Reply,
    ) -> Result<String, CommandError> {
        let app = self.config.display_name.as_str();
        let result = match command {
            Command::StartCanary { percentage } => {
                reply.reply(&format::canary_ack(percentage, user)).await;
                let record = self
                    .backend
                    .start_canary(&CanaryRequest::new(percentage, user))
                    .await;
                self.health.record(components::BACKEND, &record).await;
                let record = record?;

                reply
                    .reply(&format::canary_started(&record.deployment_id))
                    .await;
                self.notifier
                    .notify(
                        Topic::Deployments,
                        &format::canary_notice(percentage, user, &record.deployment_id),
                    )
                    .await;
                record.deployment_id
            }

            Command::Promote { percentage } => {
                reply.reply(&format::promote_ack(app, percentage)).await;
                let capacity = promoted_capacity(self.config.base_capacity, percentage);
                let result = self.backend.set_desired_capacity(capacity).await;
                self.health.record(components::BACKEND, &result).await;
                result?;

                reply
                    .reply(&format::promoted(app, percentage, capacity))
                    .await;
                self.notifier
                    .notify(
                        Topic::Deployments,
                        &format::promote_notice(app, percentage, user),
                    )
                    .await;
                format!("desired capacity {}", capacity)
            }

            Command::Rollback => {
                reply.reply(&format::rollback_ack(app)).await;
                let deployments = self.backend.list_deployments().await;
                self.health.record(components::BACKEND, &deployments).await;
                let latest = deployments?
                    .into_iter()
                    .next()
                    .ok_or(CommandError::NoDeployments)?;

                let record = self
                    .backend
                    .stop_deployment(&latest.deployment_id, true)
                    .await;
                self.health.record(components::BACKEND, &record).await;
                let record = record?;

                reply
                    .reply(&format::rolled_back(
                        &record.deployment_id,
                        &latest.deployment_id,
                    ))
                    .await;
                self.notifier
                    .notify(
                        Topic::Alerts,
                        &format::rollback_notice(app, user, &latest.deployment_id),
                    )
                    .await;
                latest.deployment_id
            }

            Command::Status => {
                reply.reply(&format::status_ack(app)).await;
                let status = self.aggregator.get_status().await;
                self.health.record(components::BACKEND, &status).await;
                let status = status?;

                reply.reply(&format::status_report(app, &status)).await;
                status.health.to_string()
            }

            Command::ShowMetrics { window_hours } => {
                reply.reply(&format::metrics_ack(window_hours)).await;
                let snapshot = self.aggregator.get_metrics(window_hours).await;
                self.health.record(components::BACKEND, &snapshot).await;
                let snapshot = snapshot?;

                reply.reply(&format::metrics_report(app, &snapshot)).await;
                format!("{}h", window_hours)
            }

            Command::RestartService { service } => {
                reply.reply(&format::restart_ack(&service)).await;
                let result = self.backend.restart_service(&service).await;
                self.health.record(components::BACKEND, &result).await;
                result?;

                reply.reply(&format::restarted(&service)).await;
                self.notifier
                    .notify(Topic::Ops, &format::restart_notice(&service, user))
                    .await;
                service
            }

            Command::HealthCheck => {
                reply.reply(&format::health_ack()).await;
                let result = self.aggregator.get_health_check().await?;
                self.metrics.set_system_healthy(result.is_healthy());

                reply.reply(&format::health_report(app, &result)).await;
                if !result.is_healthy() {
                    self.notifier
                        .notify(
                            Topic::Alerts,
                            &format::health_check_failed_notice(app, user),
                        )
                        .await;
                }
                result.overall.to_string()
            }
        };
        Ok(result)
    }
}

fn failure_context(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::StartCanary => "Deployment failed",
        CommandKind::Promote => "Promotion failed",
        CommandKind::Rollback => "Rollback failed",
        CommandKind::Status => "Status check failed",
        CommandKind::ShowMetrics => "Metrics fetch failed",
        CommandKind::RestartService => "Restart failed",
        CommandKind::HealthCheck => "Health check failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, InMemoryBackend, Operation};
    use crate::error::{AdapterError, NotifyError};
    use crate::metrics_source::SimulatedMetrics;
    use crate::models::{ProbeReading, Subsystem};
    use crate::notify::{MemorySink, NotificationSink};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Transcript {
        lines: Mutex<Vec<String>>,
    }

    impl Transcript {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        fn last(&self) -> String {
            self.lines().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Reply for Transcript {
        async fn reply(&self, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl NotificationSink for BrokenSink {
        async fn deliver(&self, _channel: &str, _text: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected { status: 503 })
        }
    }

    struct Harness {
        backend: Arc<InMemoryBackend>,
        sink: Arc<MemorySink>,
        orchestrator: Orchestrator,
    }

    fn harness_with_sink(sink: Arc<dyn NotificationSink>) -> (Arc<InMemoryBackend>, Orchestrator) {
        let config = Arc::new(ChatOpsConfig::default());
        let backend = Arc::new(InMemoryBackend::new());
        let health = HealthRegistry::new();
        let metrics = BotMetrics::new();
        let logger = StructuredLogger::new("test-bot");
        let aggregator = Arc::new(Aggregator::new(
            backend.clone(),
            Arc::new(SimulatedMetrics::new()),
            config.clone(),
        ));
        let notifier = Arc::new(Notifier::new(
            sink,
            config.channels.clone(),
            metrics.clone(),
            logger.clone(),
            health.clone(),
        ));
        let orchestrator = Orchestrator::new(
            config,
            backend.clone(),
            aggregator,
            notifier,
            metrics,
            logger,
            health,
        );
        (backend, orchestrator)
    }

    fn harness() -> Harness {
        let sink = Arc::new(MemorySink::new());
        let (backend, orchestrator) = harness_with_sink(sink.clone());
        Harness {
            backend,
            sink,
            orchestrator,
        }
    }

    impl Harness {
        async fn say(&self, user: &str, text: &str) -> (Option<CommandOutcome>, Transcript) {
            let transcript = Transcript::default();
            let outcome = self
                .orchestrator
                .handle(&ChatRequest::new(user, text), &transcript)
                .await;
            (outcome, transcript)
        }
    }

    #[test]
    fn test_promoted_capacity_rounds_up() {
        assert_eq!(promoted_capacity(10, 100), 10);
        assert_eq!(promoted_capacity(10, 25), 3);
        assert_eq!(promoted_capacity(10, 1), 1);
        assert_eq!(promoted_capacity(7, 50), 4);
    }

    #[tokio::test]
    async fn test_canary_end_to_end() {
        let h = harness();
        let (outcome, transcript) = h.say("alice", "deploy porttrack canary 30%").await;

        assert_eq!(
            outcome,
            Some(CommandOutcome {
                kind: CommandKind::StartCanary,
                status: CommandStatus::Succeeded
            })
        );

        let canary_calls: Vec<_> = h
            .backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::StartCanary { .. }))
            .collect();
        assert_eq!(
            canary_calls,
            vec![BackendCall::StartCanary {
                percentage: 30,
                description: "Canary deployment 30%".to_string()
            }]
        );

        let id = h.backend.deployments()[0].deployment_id.clone();
        assert!(transcript.lines()[0].contains("30%"));
        assert!(transcript.last().contains(&id));

        let notices = h.sink.sent_to("#porttrack-deployments");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("30%"));
        assert!(notices[0].contains("alice"));
    }

    #[tokio::test]
    async fn test_canary_out_of_bounds_touches_nothing() {
        let h = harness();
        let (outcome, transcript) = h.say("bob", "deploy porttrack canary 75%").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Rejected);
        assert!(h.backend.calls().is_empty());
        assert!(h.sink.sent().is_empty());
        assert_eq!(transcript.lines().len(), 1);
        assert!(transcript.last().contains("between 5% and 50%"));
    }

    #[tokio::test]
    async fn test_every_canary_percentage_dispatches_once_or_not_at_all() {
        for p in [0, 4, 5, 27, 50, 51, 100] {
            let h = harness();
            h.say("carol", &format!("deploy canary {}%", p)).await;
            let expected = usize::from((5..=50).contains(&p));
            assert_eq!(h.backend.mutation_count(), expected, "percentage {}", p);
        }
    }

    #[tokio::test]
    async fn test_restart_outside_allow_list_rejected() {
        let h = harness();
        let (outcome, transcript) = h.say("dave", "restart service mysql").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Rejected);
        assert!(h.backend.calls().is_empty());
        assert!(h.sink.sent().is_empty());
        assert!(transcript.last().contains("nginx, porttrack, api"));
    }

    #[tokio::test]
    async fn test_restart_notifies_ops() {
        let h = harness();
        let (outcome, _) = h.say("erin", "restart service Api").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Succeeded);
        assert_eq!(
            h.backend.calls(),
            vec![BackendCall::RestartService {
                service: "api".to_string()
            }]
        );
        assert_eq!(h.sink.sent_to("#porttrack-ops").len(), 1);
    }

    #[tokio::test]
    async fn test_adapter_failure_replies_without_notifying() {
        let h = harness();
        h.backend
            .fail(Operation::StartCanary, AdapterError::transient("Rate exceeded"));

        let (outcome, transcript) = h.say("frank", "deploy canary 10%").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Failed);
        assert!(transcript.last().contains("Rate exceeded"));
        assert!(h.sink.sent().is_empty());

        // The next command is unaffected
        h.backend.clear_failure(Operation::StartCanary);
        let (outcome, _) = h.say("frank", "deploy canary 10%").await;
        assert_eq!(outcome.unwrap().status, CommandStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_promote_scales_capacity() {
        let h = harness();
        let (outcome, _) = h.say("gina", "promote to 25%").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Succeeded);
        assert_eq!(
            h.backend.calls(),
            vec![BackendCall::SetDesiredCapacity { capacity: 3 }]
        );
        assert_eq!(h.sink.sent_to("#porttrack-deployments").len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_stops_latest_deployment() {
        let h = harness();
        h.say("hank", "deploy canary 10%").await;
        h.say("hank", "deploy canary 20%").await;
        let latest = h.backend.deployments()[0].deployment_id.clone();

        let (outcome, transcript) = h.say("hank", "rollback").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Succeeded);
        assert!(h.backend.calls().contains(&BackendCall::StopDeployment {
            deployment_id: latest.clone(),
            auto_rollback: true
        }));
        assert!(transcript.last().contains(&latest));
        assert_eq!(h.sink.sent_to("#porttrack-alerts").len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_without_deployments_fails() {
        let h = harness();
        let (outcome, transcript) = h.say("ivy", "rollback").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Failed);
        assert_eq!(h.backend.calls(), vec![BackendCall::ListDeployments]);
        assert!(transcript.last().contains("no deployments"));
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_instances() {
        let h = harness();
        let (outcome, transcript) = h.say("jo", "status").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Succeeded);
        assert!(transcript.last().contains("2/2"));
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_show_metrics_defaults_to_one_hour() {
        let h = harness();
        let (_, default_window) = h.say("kim", "show metrics").await;
        let (_, explicit) = h.say("kim", "show metrics last 1h").await;

        assert!(default_window.last().contains("(1h)"));
        assert!(explicit.last().contains("(1h)"));
    }

    #[tokio::test]
    async fn test_unhealthy_health_check_alerts() {
        let h = harness();
        h.backend
            .set_probe(Subsystem::Database, Ok(ProbeReading::down()));

        let (outcome, transcript) = h.say("lee", "health check").await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Succeeded);
        assert!(transcript.last().contains("unhealthy"));
        assert_eq!(h.sink.sent_to("#porttrack-alerts").len(), 1);
    }

    #[tokio::test]
    async fn test_healthy_health_check_is_quiet() {
        let h = harness();
        h.say("lee", "health check").await;
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_success() {
        let (backend, orchestrator) = harness_with_sink(Arc::new(BrokenSink));
        let transcript = Transcript::default();

        let outcome = orchestrator
            .handle(&ChatRequest::new("mo", "deploy canary 15%"), &transcript)
            .await;

        assert_eq!(outcome.unwrap().status, CommandStatus::Succeeded);
        assert_eq!(backend.mutation_count(), 1);
        assert!(transcript.last().contains("started"));
    }

    #[tokio::test]
    async fn test_chatter_is_ignored() {
        let h = harness();
        let (outcome, transcript) = h.say("nia", "thanks everyone").await;

        assert!(outcome.is_none());
        assert!(transcript.lines().is_empty());
        assert!(h.backend.calls().is_empty());
    }
}
