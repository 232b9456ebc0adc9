//! Infrastructure backend adapter
//!
//! A narrow request/response interface over the deployment and monitoring
//! provider. Every operation is a single round trip with no retries; all
//! failures surface as [`AdapterError`] and the caller decides what to do.
//!
//! Implementations:
//! - [`HttpBackend`]: JSON calls against a deployment control API
//! - [`InMemoryBackend`]: sandbox backend for local runs and tests
//! - [`InstrumentedBackend`]: decorator adding latency metrics and debug logs

mod http;
mod memory;

pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::{BackendCall, InMemoryBackend, Operation};

use crate::error::AdapterError;
use crate::models::{
    CanaryRequest, DeploymentRecord, GroupState, MetricPoint, MetricQuery, ProbeReading,
    Subsystem,
};
use crate::observability::BotMetrics;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub type BackendResult<T> = Result<T, AdapterError>;

/// Deployment lifecycle and monitoring operations.
///
/// Shared as `Arc<dyn InfraBackend>` between interactive commands and
/// scheduled jobs, so implementations must be safe for concurrent use.
#[async_trait]
pub trait InfraBackend: Send + Sync {
    /// Issue a staged deployment at the requested traffic percentage
    async fn start_canary(&self, request: &CanaryRequest) -> BackendResult<DeploymentRecord>;

    /// Scale the autoscaling group to an absolute desired capacity
    async fn set_desired_capacity(&self, capacity: u32) -> BackendResult<()>;

    /// Halt a deployment, rolling back when `auto_rollback` is set
    async fn stop_deployment(
        &self,
        deployment_id: &str,
        auto_rollback: bool,
    ) -> BackendResult<DeploymentRecord>;

    /// Deployments of the application, most recent first
    async fn list_deployments(&self) -> BackendResult<Vec<DeploymentRecord>>;

    async fn describe_group(&self) -> BackendResult<GroupState>;

    /// Points ordered by timestamp
    async fn metric_series(&self, query: &MetricQuery) -> BackendResult<Vec<MetricPoint>>;

    /// Request a restart. Returns once the request is accepted, not when
    /// the restart has finished.
    async fn restart_service(&self, service: &str) -> BackendResult<()>;

    async fn probe(&self, subsystem: Subsystem) -> BackendResult<ProbeReading>;
}

/// Decorator recording per-operation latency and outcome
pub struct InstrumentedBackend {
    inner: Arc<dyn InfraBackend>,
    metrics: BotMetrics,
}

impl InstrumentedBackend {
    pub fn new(inner: Arc<dyn InfraBackend>, metrics: BotMetrics) -> Self {
        Self { inner, metrics }
    }

    async fn timed<T, F>(&self, operation: &'static str, call: F) -> BackendResult<T>
    where
        T: Send,
        F: Future<Output = BackendResult<T>> + Send,
    {
        let start = Instant::now();
        let result = call.await;
        let elapsed = start.elapsed();
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_transient() => "transient_error",
            Err(_) => "permanent_error",
        };
        self.metrics
            .observe_backend_call(operation, outcome, elapsed.as_secs_f64());
        debug!(
            operation,
            outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "Backend call finished"
        );
        result
    }
}

#[async_trait]
impl InfraBackend for InstrumentedBackend {
    async fn start_canary(&self, request: &CanaryRequest) -> BackendResult<DeploymentRecord> {
        self.timed("start_canary", self.inner.start_canary(request))
            .await
    }

    async fn set_desired_capacity(&self, capacity: u32) -> BackendResult<()> {
        self.timed(
            "set_desired_capacity",
            self.inner.set_desired_capacity(capacity),
        )
        .await
    }

    async fn stop_deployment(
        &self,
        deployment_id: &str,
        auto_rollback: bool,
    ) -> BackendResult<DeploymentRecord> {
        self.timed(
            "stop_deployment",
            self.inner.stop_deployment(deployment_id, auto_rollback),
        )
        .await
    }

    async fn list_deployments(&self) -> BackendResult<Vec<DeploymentRecord>> {
        self.timed("list_deployments", self.inner.list_deployments())
            .await
    }

    async fn describe_group(&self) -> BackendResult<GroupState> {
        self.timed("describe_group", self.inner.describe_group())
            .await
    }

    async fn metric_series(&self, query: &MetricQuery) -> BackendResult<Vec<MetricPoint>> {
        self.timed("metric_series", self.inner.metric_series(query))
            .await
    }

    async fn restart_service(&self, service: &str) -> BackendResult<()> {
        self.timed("restart_service", self.inner.restart_service(service))
            .await
    }

    async fn probe(&self, subsystem: Subsystem) -> BackendResult<ProbeReading> {
        self.timed("probe", self.inner.probe(subsystem)).await
    }
}
