//! Orchestrator configuration
//!
//! Supplied once at process start and shared read-only as
//! `Arc<ChatOpsConfig>`; business logic never reads the environment.

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::time::Duration;

/// Topic channels used by the notification fan-out
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Canary starts and promotions
    #[serde(default = "default_deployments_channel")]
    pub deployments: String,
    /// Rollbacks, health failures and monitoring errors
    #[serde(default = "default_alerts_channel")]
    pub alerts: String,
    /// Restarts and the daily report
    #[serde(default = "default_ops_channel")]
    pub ops: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            deployments: default_deployments_channel(),
            alerts: default_alerts_channel(),
            ops: default_ops_channel(),
        }
    }
}

/// Background job cadence
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    #[serde(default = "default_health_poll_interval")]
    pub health_poll_interval_secs: u64,
    /// Local time of day for the daily report, `HH:MM`
    #[serde(default = "default_daily_report_time")]
    pub daily_report_time: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            health_poll_interval_secs: default_health_poll_interval(),
            daily_report_time: default_daily_report_time(),
        }
    }
}

impl SchedulerConfig {
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_secs(self.health_poll_interval_secs)
    }

    pub fn daily_report_at(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_report_time, "%H:%M").with_context(|| {
            format!(
                "daily_report_time must be HH:MM, got '{}'",
                self.daily_report_time
            )
        })
    }
}

/// Deployment target and command policy
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatOpsConfig {
    #[serde(default = "default_application")]
    pub application: String,

    /// Name used in chat messages
    #[serde(default = "default_display_name")]
    pub display_name: String,

    #[serde(default = "default_deployment_group")]
    pub deployment_group: String,

    #[serde(default = "default_deployment_config")]
    pub deployment_config: String,

    #[serde(default = "default_revision_bucket")]
    pub revision_bucket: String,

    #[serde(default = "default_revision_key")]
    pub revision_key: String,

    #[serde(default = "default_autoscaling_group")]
    pub autoscaling_group: String,

    #[serde(default = "default_load_balancer")]
    pub load_balancer: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Capacity that corresponds to 100% when promoting
    #[serde(default = "default_base_capacity")]
    pub base_capacity: u32,

    #[serde(default = "default_canary_min")]
    pub canary_min_percent: u32,

    #[serde(default = "default_canary_max")]
    pub canary_max_percent: u32,

    #[serde(default = "default_restartable_services")]
    pub restartable_services: Vec<String>,

    #[serde(default = "default_max_window")]
    pub max_metrics_window_hours: u32,

    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_application() -> String {
    "porttrack".to_string()
}

fn default_display_name() -> String {
    "PortTrack".to_string()
}

fn default_deployment_group() -> String {
    "PortTrack-DeploymentGroup".to_string()
}

fn default_deployment_config() -> String {
    "CodeDeploy.ECSCanary10Percent5Minutes".to_string()
}

fn default_revision_bucket() -> String {
    "porttrack-deployments".to_string()
}

fn default_revision_key() -> String {
    "latest/porttrack.zip".to_string()
}

fn default_autoscaling_group() -> String {
    "porttrack-asg".to_string()
}

fn default_load_balancer() -> String {
    "porttrack-alb".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_base_capacity() -> u32 {
    10
}

fn default_canary_min() -> u32 {
    5
}

fn default_canary_max() -> u32 {
    50
}

fn default_restartable_services() -> Vec<String> {
    vec!["nginx".to_string(), "porttrack".to_string(), "api".to_string()]
}

fn default_max_window() -> u32 {
    168
}

fn default_dashboard_url() -> String {
    "https://console.aws.amazon.com/cloudwatch/".to_string()
}

fn default_deployments_channel() -> String {
    "#porttrack-deployments".to_string()
}

fn default_alerts_channel() -> String {
    "#porttrack-alerts".to_string()
}

fn default_ops_channel() -> String {
    "#porttrack-ops".to_string()
}

fn default_health_poll_interval() -> u64 {
    300
}

fn default_daily_report_time() -> String {
    "08:00".to_string()
}

impl Default for ChatOpsConfig {
    fn default() -> Self {
        Self {
            application: default_application(),
            display_name: default_display_name(),
            deployment_group: default_deployment_group(),
            deployment_config: default_deployment_config(),
            revision_bucket: default_revision_bucket(),
            revision_key: default_revision_key(),
            autoscaling_group: default_autoscaling_group(),
            load_balancer: default_load_balancer(),
            region: default_region(),
            base_capacity: default_base_capacity(),
            canary_min_percent: default_canary_min(),
            canary_max_percent: default_canary_max(),
            restartable_services: default_restartable_services(),
            max_metrics_window_hours: default_max_window(),
            dashboard_url: default_dashboard_url(),
            channels: ChannelConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ChatOpsConfig {
    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.application.trim().is_empty() {
            bail!("application name must not be empty");
        }
        if self.canary_min_percent == 0 || self.canary_min_percent > self.canary_max_percent {
            bail!(
                "canary bounds are inconsistent: min {}%, max {}%",
                self.canary_min_percent,
                self.canary_max_percent
            );
        }
        if self.canary_max_percent > 100 {
            bail!("canary_max_percent cannot exceed 100");
        }
        if self.base_capacity == 0 {
            bail!("base_capacity must be at least 1");
        }
        if self.restartable_services.is_empty() {
            bail!("restartable_services must list at least one service");
        }
        if self.max_metrics_window_hours == 0 {
            bail!("max_metrics_window_hours must be at least 1");
        }
        if self.scheduler.health_poll_interval_secs == 0 {
            bail!("health_poll_interval_secs must be at least 1");
        }
        self.scheduler.daily_report_at()?;
        Ok(())
    }

    pub fn is_restartable(&self, service: &str) -> bool {
        self.restartable_services
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChatOpsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.canary_min_percent, 5);
        assert_eq!(config.canary_max_percent, 50);
        assert_eq!(config.base_capacity, 10);
        assert_eq!(config.channels.alerts, "#porttrack-alerts");
        assert_eq!(
            config.scheduler.health_poll_interval(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_inverted_canary_bounds_rejected() {
        let config = ChatOpsConfig {
            canary_min_percent: 60,
            ..ChatOpsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_report_time_rejected() {
        let mut config = ChatOpsConfig::default();
        config.scheduler.daily_report_time = "8am".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ChatOpsConfig =
            serde_json::from_str(r##"{"application":"harbor","channels":{"ops":"#ops"}}"##)
                .unwrap();
        assert_eq!(config.application, "harbor");
        assert_eq!(config.channels.ops, "#ops");
        assert_eq!(config.channels.alerts, "#porttrack-alerts");
        assert_eq!(config.restartable_services.len(), 3);
    }

    #[test]
    fn test_restart_allow_list_ignores_case() {
        let config = ChatOpsConfig::default();
        assert!(config.is_restartable("NGINX"));
        assert!(!config.is_restartable("mysql"));
    }
}
