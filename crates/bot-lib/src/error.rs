//! Error taxonomy for command handling and scheduled jobs

use thiserror::Error;

/// Bad chat input, caught before any backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("percentage must be between {min}% and {max}%, got {value}%")]
    PercentageOutOfRange { value: u64, min: u32, max: u32 },

    #[error("{field} must be a whole number, got '{raw}'")]
    MalformedNumber { field: &'static str, raw: String },

    #[error("metrics window must be between 1h and {max}h, got {value}h")]
    WindowOutOfRange { value: u64, max: u32 },

    #[error("you can only restart: {}", allowed.join(", "))]
    ServiceNotAllowed { name: String, allowed: Vec<String> },

    #[error("unknown application '{name}'")]
    UnknownApplication { name: String },
}

/// Failure reported by the infrastructure backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// Throttling, network trouble or a backend outage
    #[error("{0}")]
    Transient(String),

    /// Bad request or missing permission
    #[error("{0}")]
    Permanent(String),
}

impl AdapterError {
    pub fn transient(msg: impl Into<String>) -> Self {
        AdapterError::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        AdapterError::Permanent(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }
}

/// The health-check machinery itself failed.
///
/// Distinct from an unhealthy-but-reachable system, which is a normal
/// [`HealthCheckResult`](crate::models::HealthCheckResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("health probe for {subsystem} did not complete: {reason}")]
pub struct MonitoringError {
    pub subsystem: String,
    pub reason: String,
}

/// Everything that can fail a single chat command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Monitoring(#[from] MonitoringError),

    #[error("no deployments found to roll back")]
    NoDeployments,
}

/// Notification delivery failure
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification webhook returned {status}")]
    Rejected { status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_not_allowed_lists_allow_list() {
        let err = ValidationError::ServiceNotAllowed {
            name: "mysql".to_string(),
            allowed: vec!["nginx".into(), "porttrack".into(), "api".into()],
        };
        assert_eq!(err.to_string(), "you can only restart: nginx, porttrack, api");
    }

    #[test]
    fn test_adapter_error_keeps_backend_message() {
        let err: CommandError = AdapterError::transient("Rate exceeded").into();
        assert_eq!(err.to_string(), "Rate exceeded");
        assert!(AdapterError::transient("x").is_transient());
        assert!(!AdapterError::permanent("x").is_transient());
    }
}
