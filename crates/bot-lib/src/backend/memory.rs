//! In-process sandbox backend
//!
//! Keeps deployments, group state and metric series in memory, issues
//! deployment ids, and records every call it receives. Failures can be
//! injected per operation and per probed subsystem.

use super::{BackendResult, InfraBackend};
use crate::error::AdapterError;
use crate::models::{
    CanaryRequest, DeploymentKind, DeploymentRecord, GroupState, InstanceState, MetricPoint,
    MetricQuery, ProbeReading, Subsystem,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Most calls kept in the call log; older entries are discarded
pub const CALL_LOG_CAPACITY: usize = 1024;

/// Backend operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StartCanary,
    SetDesiredCapacity,
    StopDeployment,
    ListDeployments,
    DescribeGroup,
    MetricSeries,
    RestartService,
}

/// A call received by the sandbox backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    StartCanary { percentage: u32, description: String },
    SetDesiredCapacity { capacity: u32 },
    StopDeployment { deployment_id: String, auto_rollback: bool },
    ListDeployments,
    DescribeGroup,
    MetricSeries { metric_name: String },
    RestartService { service: String },
    Probe { subsystem: Subsystem },
}

impl BackendCall {
    /// True for calls that change backend state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            BackendCall::StartCanary { .. }
                | BackendCall::SetDesiredCapacity { .. }
                | BackendCall::StopDeployment { .. }
                | BackendCall::RestartService { .. }
        )
    }
}

struct SandboxState {
    deployments: Vec<DeploymentRecord>,
    group: GroupState,
    series: Vec<MetricPoint>,
    probes: HashMap<Subsystem, BackendResult<ProbeReading>>,
    failures: HashMap<Operation, AdapterError>,
    calls: VecDeque<BackendCall>,
    next_id: u64,
}

/// Sandbox implementation of [`InfraBackend`]
pub struct InMemoryBackend {
    state: Mutex<SandboxState>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Two healthy in-service instances, no deployments, every probe up
    pub fn new() -> Self {
        let group = GroupState {
            instances: (1..=2)
                .map(|i| InstanceState {
                    instance_id: format!("i-{:08x}", i),
                    in_service: true,
                    healthy: true,
                })
                .collect(),
            desired_capacity: 2,
        };

        Self {
            state: Mutex::new(SandboxState {
                deployments: Vec::new(),
                group,
                series: Vec::new(),
                probes: HashMap::new(),
                failures: HashMap::new(),
                calls: VecDeque::with_capacity(64),
                next_id: 1,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_group(self, group: GroupState) -> Self {
        self.state().group = group;
        self
    }

    pub fn set_group(&self, group: GroupState) {
        self.state().group = group;
    }

    pub fn set_series(&self, series: Vec<MetricPoint>) {
        self.state().series = series;
    }

    /// Seed an existing deployment as the most recent one
    pub fn push_deployment(&self, record: DeploymentRecord) {
        self.state().deployments.insert(0, record);
    }

    /// Make every subsequent call of `operation` fail with `error`
    pub fn fail(&self, operation: Operation, error: AdapterError) {
        self.state().failures.insert(operation, error);
    }

    pub fn clear_failure(&self, operation: Operation) {
        self.state().failures.remove(&operation);
    }

    pub fn set_probe(&self, subsystem: Subsystem, result: BackendResult<ProbeReading>) {
        self.state().probes.insert(subsystem, result);
    }

    /// The most recent calls received, oldest first
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.iter().cloned().collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.state().calls.iter().filter(|c| c.is_mutation()).count()
    }

    pub fn deployments(&self) -> Vec<DeploymentRecord> {
        self.state().deployments.clone()
    }

    fn enter(
        &self,
        call: BackendCall,
        operation: Option<Operation>,
    ) -> BackendResult<MutexGuard<'_, SandboxState>> {
        let mut state = self.state();
        if state.calls.len() == CALL_LOG_CAPACITY {
            state.calls.pop_front();
        }
        state.calls.push_back(call);
        if let Some(error) = operation.and_then(|op| state.failures.get(&op).cloned()) {
            return Err(error);
        }
        Ok(state)
    }

    fn issue_id(state: &mut SandboxState) -> String {
        let id = format!("d-{:09}", state.next_id);
        state.next_id += 1;
        id
    }
}

#[async_trait]
impl InfraBackend for InMemoryBackend {
    async fn start_canary(&self, request: &CanaryRequest) -> BackendResult<DeploymentRecord> {
        let mut state = self.enter(
            BackendCall::StartCanary {
                percentage: request.percentage,
                description: request.description.clone(),
            },
            Some(Operation::StartCanary),
        )?;

        let record = DeploymentRecord {
            deployment_id: Self::issue_id(&mut state),
            kind: DeploymentKind::Canary,
            percentage: Some(request.percentage),
            created_at: Utc::now(),
        };
        state.deployments.insert(0, record.clone());
        Ok(record)
    }

    async fn set_desired_capacity(&self, capacity: u32) -> BackendResult<()> {
        let mut state = self.enter(
            BackendCall::SetDesiredCapacity { capacity },
            Some(Operation::SetDesiredCapacity),
        )?;
        state.group.desired_capacity = capacity;
        Ok(())
    }

    async fn stop_deployment(
        &self,
        deployment_id: &str,
        auto_rollback: bool,
    ) -> BackendResult<DeploymentRecord> {
        let mut state = self.enter(
            BackendCall::StopDeployment {
                deployment_id: deployment_id.to_string(),
                auto_rollback,
            },
            Some(Operation::StopDeployment),
        )?;

        if !state
            .deployments
            .iter()
            .any(|d| d.deployment_id == deployment_id)
        {
            return Err(AdapterError::permanent(format!(
                "Deployment {} does not exist",
                deployment_id
            )));
        }

        let record = DeploymentRecord {
            deployment_id: Self::issue_id(&mut state),
            kind: DeploymentKind::Rollback,
            percentage: None,
            created_at: Utc::now(),
        };
        state.deployments.insert(0, record.clone());
        Ok(record)
    }

    async fn list_deployments(&self) -> BackendResult<Vec<DeploymentRecord>> {
        let state = self.enter(BackendCall::ListDeployments, Some(Operation::ListDeployments))?;
        Ok(state.deployments.clone())
    }

    async fn describe_group(&self) -> BackendResult<GroupState> {
        let state = self.enter(BackendCall::DescribeGroup, Some(Operation::DescribeGroup))?;
        Ok(state.group.clone())
    }

    async fn metric_series(&self, query: &MetricQuery) -> BackendResult<Vec<MetricPoint>> {
        let state = self.enter(
            BackendCall::MetricSeries {
                metric_name: query.metric_name.clone(),
            },
            Some(Operation::MetricSeries),
        )?;
        Ok(state
            .series
            .iter()
            .filter(|p| p.timestamp >= query.start && p.timestamp <= query.end)
            .copied()
            .collect())
    }

    async fn restart_service(&self, service: &str) -> BackendResult<()> {
        let _state = self.enter(
            BackendCall::RestartService {
                service: service.to_string(),
            },
            Some(Operation::RestartService),
        )?;
        Ok(())
    }

    async fn probe(&self, subsystem: Subsystem) -> BackendResult<ProbeReading> {
        let state = self.enter(BackendCall::Probe { subsystem }, None)?;
        match state.probes.get(&subsystem) {
            Some(result) => result.clone(),
            None if subsystem == Subsystem::Frontend => Ok(ProbeReading::up().with_latency(120)),
            None => Ok(ProbeReading::up()),
        }
    }
}
