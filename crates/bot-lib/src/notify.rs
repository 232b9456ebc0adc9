//! Notification fan-out to topic channels
//!
//! Handles:
//! - Mapping notification topics to the configured channel names
//! - Delivery through a pluggable sink (chat webhook or log only)
//! - Counting and logging delivery failures without failing the caller

use crate::config::ChannelConfig;
use crate::error::NotifyError;
use crate::health::{components, HealthRegistry};
use crate::observability::{BotMetrics, StructuredLogger};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Notification topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Canary starts and promotions
    Deployments,
    /// Rollbacks, health failures, monitoring errors
    Alerts,
    /// Restarts and the daily report
    Ops,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Deployments => write!(f, "deployments"),
            Topic::Alerts => write!(f, "alerts"),
            Topic::Ops => write!(f, "ops"),
        }
    }
}

/// Delivers a message to a named channel
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), NotifyError>;
}

/// Sink that only writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        info!(channel = %channel, text = %text, "Notification");
        Ok(())
    }
}

/// Sink keeping every delivered notification in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered `(channel, text)` pairs, oldest first
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Sink posting `{"channel", "text"}` to a chat incoming-webhook URL
pub struct WebhookSink {
    client: Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let url = Url::parse(url).context("Invalid notification webhook URL")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&WebhookMessage { channel, text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Fan-out used by both the orchestrator and the scheduler
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    channels: ChannelConfig,
    metrics: BotMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl Notifier {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        channels: ChannelConfig,
        metrics: BotMetrics,
        logger: StructuredLogger,
        health: HealthRegistry,
    ) -> Self {
        Self {
            sink,
            channels,
            metrics,
            logger,
            health,
        }
    }

    pub fn channel(&self, topic: Topic) -> &str {
        match topic {
            Topic::Deployments => &self.channels.deployments,
            Topic::Alerts => &self.channels.alerts,
            Topic::Ops => &self.channels.ops,
        }
    }

    /// Send `text` to the channel of `topic`.
    ///
    /// Delivery failures are logged, counted and reflected in the bot's
    /// self-health; they never propagate. Returns whether delivery succeeded.
    pub async fn notify(&self, topic: Topic, text: &str) -> bool {
        let channel = self.channel(topic);
        let result = self.sink.deliver(channel, text).await;

        let delivered = result.is_ok();
        self.metrics
            .inc_notification(channel, if delivered { "delivered" } else { "failed" });
        self.logger.log_notification(
            channel,
            delivered,
            result.as_ref().err().map(|e| e.to_string()).as_deref(),
        );
        self.health.record(components::NOTIFIER, &result).await;
        delivered
    }
}
