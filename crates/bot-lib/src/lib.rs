//! Core library for the deployment chat-ops bot
//!
//! This crate provides:
//! - An infrastructure backend abstraction with HTTP and in-memory adapters
//! - Health and metrics aggregation over the backend
//! - Chat command parsing and orchestration
//! - Scheduled health polling and daily reporting
//! - Notification fan-out to topic channels
//! - Self-health checks and observability

pub mod aggregator;
pub mod backend;
pub mod command;
pub mod config;
pub mod error;
pub mod format;
pub mod health;
pub mod metrics_source;
pub mod models;
pub mod notify;
pub mod observability;
pub mod scheduler;

pub use aggregator::Aggregator;
pub use backend::{HttpBackend, HttpBackendConfig, InMemoryBackend, InfraBackend, InstrumentedBackend};
pub use command::{ChatRequest, CommandOutcome, CommandStatus, Orchestrator, Reply};
pub use config::ChatOpsConfig;
pub use error::{AdapterError, CommandError, MonitoringError, NotifyError, ValidationError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use metrics_source::{MetricsSource, SimulatedMetrics};
pub use models::*;
pub use notify::{LogSink, MemorySink, NotificationSink, Notifier, Topic, WebhookSink};
pub use observability::{BotMetrics, StructuredLogger};
pub use scheduler::{JobKind, JobOutcome, Scheduler};
