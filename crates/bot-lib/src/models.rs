//! Core data models for the chat-ops orchestrator
//!
//! Everything here is a value object: produced and consumed within a single
//! command or scheduled job, never shared as mutable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of deployment lifecycle record reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentKind {
    Canary,
    Rollback,
    Standard,
}

/// One attempt to advance the deployment lifecycle.
///
/// The id is issued by the backend and treated as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployment_id: String,
    pub kind: DeploymentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Request for a staged (canary) deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanaryRequest {
    /// Traffic percentage for the canary step
    pub percentage: u32,
    /// Human readable description, carries the percentage
    pub description: String,
    /// Chat identity that asked for the rollout
    pub requested_by: String,
}

impl CanaryRequest {
    pub fn new(percentage: u32, requested_by: impl Into<String>) -> Self {
        Self {
            percentage,
            description: format!("Canary deployment {}%", percentage),
            requested_by: requested_by.into(),
        }
    }
}

/// State of a single instance in the autoscaling group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    pub instance_id: String,
    pub in_service: bool,
    pub healthy: bool,
}

/// Autoscaling group state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub instances: Vec<InstanceState>,
    pub desired_capacity: u32,
}

/// Metric dimension filter (e.g. `LoadBalancer=porttrack-alb`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// Time-series query against the monitoring backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: u32,
}

/// One point of a metric series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Subsystems probed by the health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Frontend,
    LoadBalancer,
    Database,
    MetricsBackend,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [
        Subsystem::Frontend,
        Subsystem::LoadBalancer,
        Subsystem::Database,
        Subsystem::MetricsBackend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Frontend => "frontend",
            Subsystem::LoadBalancer => "load_balancer",
            Subsystem::Database => "database",
            Subsystem::MetricsBackend => "metrics_backend",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing one subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReading {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ProbeReading {
    pub fn up() -> Self {
        Self {
            healthy: true,
            latency_ms: None,
        }
    }

    pub fn down() -> Self {
        Self {
            healthy: false,
            latency_ms: None,
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Computed health verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthVerdict {
    Healthy,
    Unhealthy,
}

impl HealthVerdict {
    pub fn from_all<I: IntoIterator<Item = bool>>(checks: I) -> Self {
        if checks.into_iter().all(|ok| ok) {
            HealthVerdict::Healthy
        } else {
            HealthVerdict::Unhealthy
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Healthy)
    }
}

impl fmt::Display for HealthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthVerdict::Healthy => write!(f, "healthy"),
            HealthVerdict::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Point-in-time composite view of the running system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub health: HealthVerdict,
    pub running_instances: u32,
    pub desired_instances: u32,
    pub cpu_percent: u32,
    pub response_time_ms: u32,
    /// CPU and response time come from the placeholder source
    pub estimated: bool,
    pub last_deployment: Option<DateTime<Utc>>,
}

/// Composite verdict of the subsystem probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub overall: HealthVerdict,
    pub frontend: bool,
    pub frontend_latency_ms: u64,
    pub load_balancer: bool,
    pub database: bool,
    pub metrics_backend: bool,
}

impl HealthCheckResult {
    /// Fail-closed result: unhealthy with every probe reported down
    pub fn failed() -> Self {
        Self {
            overall: HealthVerdict::Unhealthy,
            frontend: false,
            frontend_latency_ms: 0,
            load_balancer: false,
            database: false,
            metrics_backend: false,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall.is_healthy()
    }
}

/// Aggregated performance and business counters for a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub window_hours: u32,
    pub requests_per_min: u64,
    /// False when the request rate was measured from the backend series
    pub requests_estimated: bool,
    pub response_time_ms: u32,
    pub error_rate_percent: f64,
    pub units_processed: u32,
    pub operations_count: u32,
    pub avg_processing_minutes: u32,
    pub cpu_percent: u32,
    pub memory_percent: u32,
    pub disk_percent: u32,
    pub uptime_percent: f64,
}
