//! Observability infrastructure for the chat-ops bot
//!
//! Provides:
//! - Prometheus metrics (commands, backend call latency, scheduled jobs, notifications)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for backend round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<BotMetricsInner> = OnceLock::new();

struct BotMetricsInner {
    commands_total: IntCounterVec,
    backend_call_seconds: HistogramVec,
    job_runs_total: IntCounterVec,
    notifications_total: IntCounterVec,
    system_healthy: IntGauge,
}

impl BotMetricsInner {
    fn new() -> Self {
        Self {
            commands_total: register_int_counter_vec!(
                "chatops_commands_total",
                "Chat commands handled, by command and outcome",
                &["command", "outcome"]
            )
            .expect("Failed to register commands_total"),

            backend_call_seconds: register_histogram_vec!(
                "chatops_backend_call_seconds",
                "Latency of infrastructure backend calls",
                &["operation", "outcome"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register backend_call_seconds"),

            job_runs_total: register_int_counter_vec!(
                "chatops_job_runs_total",
                "Scheduled job runs, by job and outcome",
                &["job", "outcome"]
            )
            .expect("Failed to register job_runs_total"),

            notifications_total: register_int_counter_vec!(
                "chatops_notifications_total",
                "Channel notifications, by channel and outcome",
                &["channel", "outcome"]
            )
            .expect("Failed to register notifications_total"),

            system_healthy: register_int_gauge!(
                "chatops_system_healthy",
                "Last health check verdict of the deployed system (1 healthy, 0 unhealthy)"
            )
            .expect("Failed to register system_healthy"),
        }
    }
}

/// Bot metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct BotMetrics {
    _private: (),
}

impl Default for BotMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BotMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(BotMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &BotMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_command(&self, command: &str, outcome: &str) {
        self.inner()
            .commands_total
            .with_label_values(&[command, outcome])
            .inc();
    }

    pub fn observe_backend_call(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.inner()
            .backend_call_seconds
            .with_label_values(&[operation, outcome])
            .observe(duration_secs);
    }

    pub fn inc_job_run(&self, job: &str, outcome: &str) {
        self.inner()
            .job_runs_total
            .with_label_values(&[job, outcome])
            .inc();
    }

    pub fn inc_notification(&self, channel: &str, outcome: &str) {
        self.inner()
            .notifications_total
            .with_label_values(&[channel, outcome])
            .inc();
    }

    pub fn set_system_healthy(&self, healthy: bool) {
        self.inner().system_healthy.set(i64::from(healthy));
    }
}

/// Structured logger for bot events
///
/// Consistent JSON-formatted events for commands, notifications and
/// scheduled jobs.
#[derive(Clone)]
pub struct StructuredLogger {
    bot_name: String,
}

impl StructuredLogger {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }

    /// Log the end of one chat command
    pub fn log_command(&self, user: &str, command: &str, outcome: &str, detail: &str) {
        match outcome {
            "failed" => warn!(
                event = "command_handled",
                bot = %self.bot_name,
                user = %user,
                command = %command,
                outcome = %outcome,
                detail = %detail,
                "Command failed"
            ),
            _ => info!(
                event = "command_handled",
                bot = %self.bot_name,
                user = %user,
                command = %command,
                outcome = %outcome,
                detail = %detail,
                "Command handled"
            ),
        }
    }

    pub fn log_notification(&self, channel: &str, delivered: bool, error: Option<&str>) {
        if delivered {
            info!(
                event = "notification_sent",
                bot = %self.bot_name,
                channel = %channel,
                "Channel notified"
            );
        } else {
            warn!(
                event = "notification_failed",
                bot = %self.bot_name,
                channel = %channel,
                error = ?error,
                "Channel notification failed"
            );
        }
    }

    pub fn log_job(&self, job: &str, outcome: &str, elapsed_ms: u64) {
        info!(
            event = "job_completed",
            bot = %self.bot_name,
            job = %job,
            outcome = %outcome,
            elapsed_ms = elapsed_ms,
            "Scheduled job finished"
        );
    }

    pub fn log_startup(&self, version: &str, backend: &str) {
        info!(
            event = "bot_started",
            bot = %self.bot_name,
            version = %version,
            backend = %backend,
            "ChatOps bot started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "bot_shutdown",
            bot = %self.bot_name,
            reason = %reason,
            "ChatOps bot shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_metrics_creation() {
        let metrics = BotMetrics::new();

        metrics.inc_command("start_canary", "succeeded");
        metrics.observe_backend_call("start_canary", "ok", 0.02);
        metrics.inc_job_run("health_poll", "healthy");
        metrics.inc_notification("#porttrack-alerts", "delivered");
        metrics.set_system_healthy(false);

        // A second handle shares the registered metrics
        let again = BotMetrics::new();
        again.inc_command("status", "succeeded");
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("porttrack-bot");
        assert_eq!(logger.bot_name, "porttrack-bot");
    }
}
