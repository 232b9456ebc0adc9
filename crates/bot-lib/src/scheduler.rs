//! Background jobs
//!
//! Two jobs drive the same aggregator and formatting code as the chat
//! commands:
//! - HealthPoll: fixed interval, alerts when the system is unhealthy and
//!   sends a distinct alert when the check itself cannot run
//! - DailyReport: once a day at a local time of day, posts a 24h digest
//!
//! Every trigger runs in its own task. A per-job guard skips a run while the
//! previous run of the same job is still in flight.

use crate::aggregator::Aggregator;
use crate::config::ChatOpsConfig;
use crate::format;
use crate::health::{components, HealthRegistry};
use crate::notify::{Notifier, Topic};
use crate::observability::{BotMetrics, StructuredLogger};
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Window of the daily digest
pub const DAILY_REPORT_WINDOW_HOURS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    HealthPoll,
    DailyReport,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::HealthPoll => "health_poll",
            JobKind::DailyReport => "daily_report",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Healthy,
    /// Alert sent to the alerts channel
    Unhealthy,
    /// The health check could not run; monitoring alert sent
    MonitoringFailed,
    Reported,
    ReportFailed,
    /// A previous run of the same job was still in flight
    Skipped,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Healthy => "healthy",
            JobOutcome::Unhealthy => "unhealthy",
            JobOutcome::MonitoringFailed => "monitoring_failed",
            JobOutcome::Reported => "reported",
            JobOutcome::ReportFailed => "report_failed",
            JobOutcome::Skipped => "skipped",
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::MonitoringFailed | JobOutcome::ReportFailed)
    }
}

/// Next occurrence of local time-of-day `at` strictly after `now`.
///
/// Times that do not exist on a given day (DST gaps) move to the next day.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    (0..=2)
        .filter_map(|offset| {
            let day = today + ChronoDuration::days(offset);
            tz.from_local_datetime(&day.and_time(at)).earliest()
        })
        .find(|candidate| candidate > now)
        .unwrap_or_else(|| now.clone() + ChronoDuration::days(1))
}

pub struct Scheduler {
    config: Arc<ChatOpsConfig>,
    aggregator: Arc<Aggregator>,
    notifier: Arc<Notifier>,
    metrics: BotMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
    health_poll_running: Mutex<()>,
    daily_report_running: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        config: Arc<ChatOpsConfig>,
        aggregator: Arc<Aggregator>,
        notifier: Arc<Notifier>,
        metrics: BotMetrics,
        logger: StructuredLogger,
        health: HealthRegistry,
    ) -> Self {
        Self {
            config,
            aggregator,
            notifier,
            metrics,
            logger,
            health,
            health_poll_running: Mutex::new(()),
            daily_report_running: Mutex::new(()),
        }
    }

    fn guard(&self, kind: JobKind) -> &Mutex<()> {
        match kind {
            JobKind::HealthPoll => &self.health_poll_running,
            JobKind::DailyReport => &self.daily_report_running,
        }
    }

    /// Run one job now, unless the same job is already running
    pub async fn run_job(&self, kind: JobKind) -> JobOutcome {
        let Ok(_running) = self.guard(kind).try_lock() else {
            warn!(job = %kind, "Previous run still in progress, skipping");
            self.metrics.inc_job_run(kind.as_str(), JobOutcome::Skipped.as_str());
            return JobOutcome::Skipped;
        };

        let start = Instant::now();
        let outcome = match kind {
            JobKind::HealthPoll => self.health_poll().await,
            JobKind::DailyReport => self.daily_report().await,
        };

        self.metrics.inc_job_run(kind.as_str(), outcome.as_str());
        self.logger.log_job(
            kind.as_str(),
            outcome.as_str(),
            start.elapsed().as_millis() as u64,
        );
        if outcome.is_failure() {
            self.health
                .set_degraded(components::SCHEDULER, format!("{} failed", kind))
                .await;
        } else {
            self.health.set_healthy(components::SCHEDULER).await;
        }
        outcome
    }

    async fn health_poll(&self) -> JobOutcome {
        let app = self.config.display_name.as_str();
        match self.aggregator.get_health_check().await {
            Ok(result) if result.is_healthy() => {
                self.metrics.set_system_healthy(true);
                JobOutcome::Healthy
            }
            Ok(_) => {
                self.metrics.set_system_healthy(false);
                self.notifier
                    .notify(Topic::Alerts, &format::health_poll_alert(app))
                    .await;
                JobOutcome::Unhealthy
            }
            Err(e) => {
                warn!(error = %e, "Automated health check failed");
                self.notifier
                    .notify(Topic::Alerts, &format::monitoring_failed(&e))
                    .await;
                JobOutcome::MonitoringFailed
            }
        }
    }

    async fn daily_report(&self) -> JobOutcome {
        match self
            .aggregator
            .get_metrics(DAILY_REPORT_WINDOW_HOURS)
            .await
        {
            Ok(snapshot) => {
                let report = format::daily_report(
                    &self.config.display_name,
                    Local::now().date_naive(),
                    &snapshot,
                    &self.config.dashboard_url,
                );
                self.notifier.notify(Topic::Ops, &report).await;
                JobOutcome::Reported
            }
            Err(e) => {
                warn!(error = %e, "Daily report failed");
                self.notifier
                    .notify(Topic::Alerts, &format::daily_report_failed(&e))
                    .await;
                JobOutcome::ReportFailed
            }
        }
    }

    fn trigger(self: &Arc<Self>, kind: JobKind) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_job(kind).await;
        });
    }

    /// Start both job loops. They stop when `shutdown` fires.
    pub fn spawn(self: &Arc<Self>, shutdown: &broadcast::Sender<()>) -> Result<Vec<JoinHandle<()>>> {
        let report_at = self.config.scheduler.daily_report_at()?;
        let poll_every = self.config.scheduler.health_poll_interval();

        let health_poll = {
            let scheduler = Arc::clone(self);
            let shutdown = shutdown.subscribe();
            tokio::spawn(async move { scheduler.health_poll_loop(poll_every, shutdown).await })
        };
        let daily_report = {
            let scheduler = Arc::clone(self);
            let shutdown = shutdown.subscribe();
            tokio::spawn(async move { scheduler.daily_report_loop(report_at, shutdown).await })
        };

        Ok(vec![health_poll, daily_report])
    }

    async fn health_poll_loop(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(interval_secs = every.as_secs(), "Starting health poll");
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.trigger(JobKind::HealthPoll),
                _ = shutdown.recv() => {
                    info!("Shutting down health poll");
                    break;
                }
            }
        }
    }

    async fn daily_report_loop(self: Arc<Self>, at: NaiveTime, mut shutdown: broadcast::Receiver<()>) {
        info!(at = %at, "Starting daily report schedule");

        loop {
            let now = Local::now();
            let next = next_daily_run(&now, at);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, "Daily report scheduled");

            tokio::select! {
                _ = sleep(wait) => self.trigger(JobKind::DailyReport),
                _ = shutdown.recv() => {
                    info!("Shutting down daily report schedule");
                    break;
                }
            }
        }
    }
}
