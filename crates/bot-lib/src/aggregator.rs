//! Health & metrics aggregation
//!
//! Combines several backend calls into the composite views used by chat
//! commands and scheduled jobs:
//! - [`StatusSnapshot`]: deployment health, instance counts, point metrics
//! - [`HealthCheckResult`]: fail-closed subsystem probes
//! - [`MetricsSnapshot`]: trailing-window performance and business counters

use crate::backend::InfraBackend;
use crate::config::ChatOpsConfig;
use crate::error::{AdapterError, MonitoringError};
use crate::metrics_source::MetricsSource;
use crate::models::{
    Dimension, HealthCheckResult, HealthVerdict, MetricQuery, MetricsSnapshot, StatusSnapshot,
    Subsystem,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Monitoring namespace of the load balancer request counter
pub const REQUEST_COUNT_NAMESPACE: &str = "AWS/ApplicationELB";
pub const REQUEST_COUNT_METRIC: &str = "RequestCount";
const REQUEST_COUNT_PERIOD_SECS: u32 = 3600;

pub struct Aggregator {
    backend: Arc<dyn InfraBackend>,
    metrics_source: Arc<dyn MetricsSource>,
    config: Arc<ChatOpsConfig>,
}

impl Aggregator {
    pub fn new(
        backend: Arc<dyn InfraBackend>,
        metrics_source: Arc<dyn MetricsSource>,
        config: Arc<ChatOpsConfig>,
    ) -> Self {
        Self {
            backend,
            metrics_source,
            config,
        }
    }

    /// Build a fresh status snapshot.
    ///
    /// Health is Healthy iff every instance reports healthy; running counts
    /// in-service instances. CPU and response time are placeholder values.
    pub async fn get_status(&self) -> Result<StatusSnapshot, AdapterError> {
        let (deployments, group) = tokio::join!(
            self.backend.list_deployments(),
            self.backend.describe_group()
        );
        let deployments = deployments?;
        let group = group?;
        let estimates = self.metrics_source.point_estimates().await?;

        let health = HealthVerdict::from_all(group.instances.iter().map(|i| i.healthy));
        let running = group.instances.iter().filter(|i| i.in_service).count() as u32;

        Ok(StatusSnapshot {
            health,
            running_instances: running,
            desired_instances: group.desired_capacity,
            cpu_percent: estimates.cpu_percent,
            response_time_ms: estimates.response_time_ms,
            estimated: true,
            last_deployment: deployments.first().map(|d| d.created_at),
        })
    }

    /// Probe every subsystem concurrently.
    ///
    /// Fail-closed: a probe reporting down or failing with an adapter error
    /// yields an unhealthy result with every probe false. A probe task that
    /// cannot complete is a [`MonitoringError`].
    pub async fn get_health_check(&self) -> Result<HealthCheckResult, MonitoringError> {
        let handles: Vec<_> = Subsystem::ALL
            .iter()
            .map(|&subsystem| {
                let backend = Arc::clone(&self.backend);
                (
                    subsystem,
                    tokio::spawn(async move { backend.probe(subsystem).await }),
                )
            })
            .collect();

        let mut all_up = true;
        let mut frontend_latency_ms = 0;

        for (subsystem, handle) in handles {
            let outcome = handle.await.map_err(|e| MonitoringError {
                subsystem: subsystem.to_string(),
                reason: if e.is_panic() {
                    "probe task panicked".to_string()
                } else {
                    "probe task was cancelled".to_string()
                },
            })?;

            match outcome {
                Ok(reading) => {
                    debug!(subsystem = %subsystem, healthy = reading.healthy, "Probe finished");
                    if subsystem == Subsystem::Frontend {
                        frontend_latency_ms = reading.latency_ms.unwrap_or_default();
                    }
                    all_up &= reading.healthy;
                }
                Err(e) => {
                    warn!(subsystem = %subsystem, error = %e, "Probe failed");
                    all_up = false;
                }
            }
        }

        if !all_up {
            return Ok(HealthCheckResult::failed());
        }

        Ok(HealthCheckResult {
            overall: HealthVerdict::Healthy,
            frontend: true,
            frontend_latency_ms,
            load_balancer: true,
            database: true,
            metrics_backend: true,
        })
    }

    /// Metrics for the trailing `window_hours` (at least one hour).
    ///
    /// The request rate is measured from the load balancer request count
    /// when the backend returns datapoints; everything else is estimated.
    pub async fn get_metrics(&self, window_hours: u32) -> Result<MetricsSnapshot, AdapterError> {
        let window_hours = window_hours.max(1);
        let end = Utc::now();
        let query = MetricQuery {
            namespace: REQUEST_COUNT_NAMESPACE.to_string(),
            metric_name: REQUEST_COUNT_METRIC.to_string(),
            dimensions: vec![Dimension {
                name: "LoadBalancer".to_string(),
                value: self.config.load_balancer.clone(),
            }],
            start: end - Duration::hours(i64::from(window_hours)),
            end,
            period_secs: REQUEST_COUNT_PERIOD_SECS,
        };

        let series = self.backend.metric_series(&query).await?;
        let estimates = self.metrics_source.window_estimates(window_hours).await?;

        let (requests_per_min, requests_estimated) = if series.is_empty() {
            (estimates.requests_per_min, true)
        } else {
            let total: f64 = series.iter().map(|p| p.value).sum();
            let minutes = f64::from(window_hours) * 60.0;
            ((total / minutes).round().max(0.0) as u64, false)
        };

        Ok(MetricsSnapshot {
            window_hours,
            requests_per_min,
            requests_estimated,
            response_time_ms: estimates.response_time_ms,
            error_rate_percent: estimates.error_rate_percent,
            units_processed: estimates.units_processed,
            operations_count: estimates.operations_count,
            avg_processing_minutes: estimates.avg_processing_minutes,
            cpu_percent: estimates.cpu_percent,
            memory_percent: estimates.memory_percent,
            disk_percent: estimates.disk_percent,
            uptime_percent: estimates.uptime_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, InMemoryBackend, Operation};
    use crate::metrics_source::SimulatedMetrics;
    use crate::models::{GroupState, InstanceState, MetricPoint, ProbeReading};

    fn aggregator(backend: Arc<InMemoryBackend>) -> Aggregator {
        Aggregator::new(
            backend,
            Arc::new(SimulatedMetrics::new()),
            Arc::new(ChatOpsConfig::default()),
        )
    }

    fn instance(id: &str, in_service: bool, healthy: bool) -> InstanceState {
        InstanceState {
            instance_id: id.to_string(),
            in_service,
            healthy,
        }
    }

    #[tokio::test]
    async fn test_status_counts_in_service_instances() {
        let backend = Arc::new(InMemoryBackend::new().with_group(GroupState {
            instances: vec![
                instance("i-1", true, true),
                instance("i-2", false, true),
                instance("i-3", true, true),
            ],
            desired_capacity: 4,
        }));
        let status = aggregator(backend).get_status().await.unwrap();

        assert_eq!(status.health, HealthVerdict::Healthy);
        assert_eq!(status.running_instances, 2);
        assert_eq!(status.desired_instances, 4);
        assert!(status.estimated);
        assert!(status.last_deployment.is_none());
    }

    #[tokio::test]
    async fn test_status_unhealthy_when_any_instance_unhealthy() {
        let backend = Arc::new(InMemoryBackend::new().with_group(GroupState {
            instances: vec![instance("i-1", true, true), instance("i-2", true, false)],
            desired_capacity: 2,
        }));
        let status = aggregator(backend).get_status().await.unwrap();
        assert_eq!(status.health, HealthVerdict::Unhealthy);
    }

    #[tokio::test]
    async fn test_status_is_stable_without_backend_changes() {
        let backend = Arc::new(InMemoryBackend::new());
        let aggregator = aggregator(backend);

        let first = aggregator.get_status().await.unwrap();
        let second = aggregator.get_status().await.unwrap();

        assert_eq!(first.health, second.health);
        assert_eq!(first.running_instances, second.running_instances);
        assert_eq!(first.desired_instances, second.desired_instances);
    }

    #[tokio::test]
    async fn test_status_propagates_adapter_error() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail(Operation::DescribeGroup, AdapterError::permanent("AccessDenied"));

        let err = aggregator(backend).get_status().await.unwrap_err();
        assert_eq!(err, AdapterError::permanent("AccessDenied"));
    }

    #[tokio::test]
    async fn test_health_check_all_probes_up() {
        let backend = Arc::new(InMemoryBackend::new());
        let result = aggregator(backend).get_health_check().await.unwrap();

        assert!(result.is_healthy());
        assert!(result.frontend && result.load_balancer && result.database && result.metrics_backend);
        assert_eq!(result.frontend_latency_ms, 120);
    }

    #[tokio::test]
    async fn test_health_check_fails_closed_on_single_probe_down() {
        for subsystem in Subsystem::ALL {
            let backend = Arc::new(InMemoryBackend::new());
            backend.set_probe(subsystem, Ok(ProbeReading::down()));

            let result = aggregator(backend).get_health_check().await.unwrap();
            assert_eq!(result, HealthCheckResult::failed(), "{} down", subsystem);
        }
    }

    #[tokio::test]
    async fn test_health_check_fails_closed_on_probe_error() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_probe(
            Subsystem::Database,
            Err(AdapterError::transient("connection reset")),
        );

        let result = aggregator(backend).get_health_check().await.unwrap();
        assert!(!result.is_healthy());
        assert!(!result.frontend);
        assert!(!result.load_balancer);
        assert!(!result.database);
        assert!(!result.metrics_backend);
    }

    #[tokio::test]
    async fn test_metrics_measures_request_rate_from_series() {
        let backend = Arc::new(InMemoryBackend::new());
        let now = Utc::now();
        backend.set_series(vec![
            MetricPoint {
                timestamp: now - Duration::minutes(90),
                value: 60_000.0,
            },
            MetricPoint {
                timestamp: now - Duration::minutes(30),
                value: 60_000.0,
            },
        ]);

        let snapshot = aggregator(backend.clone()).get_metrics(2).await.unwrap();

        assert_eq!(snapshot.window_hours, 2);
        assert_eq!(snapshot.requests_per_min, 1000);
        assert!(!snapshot.requests_estimated);
        assert!(backend.calls().contains(&BackendCall::MetricSeries {
            metric_name: REQUEST_COUNT_METRIC.to_string()
        }));
    }

    #[tokio::test]
    async fn test_metrics_without_series_is_estimated() {
        let backend = Arc::new(InMemoryBackend::new());
        let snapshot = aggregator(backend).get_metrics(0).await.unwrap();

        assert_eq!(snapshot.window_hours, 1);
        assert!(snapshot.requests_estimated);
    }
}
