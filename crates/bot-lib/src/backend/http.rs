//! HTTP client for the deployment control API
//!
//! Error mapping:
//! - connection failures, timeouts, 429 and 5xx responses are transient
//! - every other non-success status and undecodable bodies are permanent

use super::{BackendResult, InfraBackend};
use crate::config::ChatOpsConfig;
use crate::error::AdapterError;
use crate::models::{
    CanaryRequest, DeploymentRecord, GroupState, MetricPoint, MetricQuery, ProbeReading,
    Subsystem,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Connection settings for [`HttpBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the control API (e.g. "http://deploy-api:8080")
    pub endpoint: String,
    pub request_timeout: Duration,
    pub api_token: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            request_timeout: Duration::from_secs(30),
            api_token: None,
        }
    }
}

#[derive(Serialize)]
struct RevisionLocation<'a> {
    bucket: &'a str,
    key: &'a str,
}

#[derive(Serialize)]
struct CreateDeploymentBody<'a> {
    deployment_group: &'a str,
    deployment_config: &'a str,
    revision: RevisionLocation<'a>,
    description: &'a str,
    requested_by: &'a str,
    canary_percentage: u32,
}

#[derive(Serialize)]
struct DesiredCapacityBody {
    desired_capacity: u32,
}

#[derive(Serialize)]
struct StopDeploymentBody {
    auto_rollback_enabled: bool,
}

#[derive(Deserialize)]
struct DeploymentList {
    deployments: Vec<DeploymentRecord>,
}

#[derive(Deserialize)]
struct Datapoints {
    datapoints: Vec<MetricPoint>,
}

/// [`InfraBackend`] over a JSON control API
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
    target: Arc<ChatOpsConfig>,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig, target: Arc<ChatOpsConfig>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(&config.endpoint).context("Invalid backend endpoint URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend endpoint {} cannot be used as a base URL", base_url);
        }

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token,
            target,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AdapterError::permanent("backend endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("x-region", &self.target.region);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> BackendResult<reqwest::Response> {
        let response = self
            .prepare(request)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        self.execute(request)
            .await?
            .json()
            .await
            .map_err(|e| AdapterError::permanent(format!("Unexpected backend response: {}", e)))
    }
}

fn map_send_error(e: reqwest::Error) -> AdapterError {
    if e.is_timeout() {
        AdapterError::transient(format!("Backend request timed out: {}", e))
    } else if e.is_connect() {
        AdapterError::transient(format!("Backend unreachable: {}", e))
    } else if e.is_builder() {
        AdapterError::permanent(format!("Invalid backend request: {}", e))
    } else {
        AdapterError::transient(format!("Backend request failed: {}", e))
    }
}

fn classify_status(status: StatusCode, body: &str) -> AdapterError {
    let message = if body.trim().is_empty() {
        format!("Backend returned {}", status)
    } else {
        format!("Backend returned {}: {}", status, body.trim())
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AdapterError::Transient(message)
    } else {
        AdapterError::Permanent(message)
    }
}

#[async_trait]
impl InfraBackend for HttpBackend {
    async fn start_canary(&self, request: &CanaryRequest) -> BackendResult<DeploymentRecord> {
        let url = self.url(&[
            "v1",
            "applications",
            self.target.application.as_str(),
            "deployments",
        ])?;
        let body = CreateDeploymentBody {
            deployment_group: &self.target.deployment_group,
            deployment_config: &self.target.deployment_config,
            revision: RevisionLocation {
                bucket: &self.target.revision_bucket,
                key: &self.target.revision_key,
            },
            description: &request.description,
            requested_by: &request.requested_by,
            canary_percentage: request.percentage,
        };
        self.fetch(self.client.post(url).json(&body)).await
    }

    async fn set_desired_capacity(&self, capacity: u32) -> BackendResult<()> {
        let url = self.url(&[
            "v1",
            "autoscaling-groups",
            self.target.autoscaling_group.as_str(),
            "desired-capacity",
        ])?;
        let body = DesiredCapacityBody {
            desired_capacity: capacity,
        };
        self.execute(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn stop_deployment(
        &self,
        deployment_id: &str,
        auto_rollback: bool,
    ) -> BackendResult<DeploymentRecord> {
        let url = self.url(&["v1", "deployments", deployment_id, "stop"])?;
        let body = StopDeploymentBody {
            auto_rollback_enabled: auto_rollback,
        };
        self.fetch(self.client.post(url).json(&body)).await
    }

    async fn list_deployments(&self) -> BackendResult<Vec<DeploymentRecord>> {
        let url = self.url(&[
            "v1",
            "applications",
            self.target.application.as_str(),
            "deployments",
        ])?;
        let mut list: DeploymentList = self.fetch(self.client.get(url)).await?;
        list.deployments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list.deployments)
    }

    async fn describe_group(&self) -> BackendResult<GroupState> {
        let url = self.url(&[
            "v1",
            "autoscaling-groups",
            self.target.autoscaling_group.as_str(),
        ])?;
        self.fetch(self.client.get(url)).await
    }

    async fn metric_series(&self, query: &MetricQuery) -> BackendResult<Vec<MetricPoint>> {
        let url = self.url(&["v1", "metrics", "query"])?;
        let mut points: Datapoints = self.fetch(self.client.post(url).json(query)).await?;
        points.datapoints.sort_by_key(|p| p.timestamp);
        Ok(points.datapoints)
    }

    async fn restart_service(&self, service: &str) -> BackendResult<()> {
        let url = self.url(&["v1", "services", service, "restart"])?;
        self.execute(self.client.post(url)).await?;
        Ok(())
    }

    async fn probe(&self, subsystem: Subsystem) -> BackendResult<ProbeReading> {
        let url = self.url(&["v1", "health", subsystem.as_str()])?;
        let start = Instant::now();
        let reading: ProbeReading = self.fetch(self.client.get(url)).await?;

        if reading.latency_ms.is_none() && subsystem == Subsystem::Frontend {
            return Ok(reading.with_latency(start.elapsed().as_millis() as u64));
        }
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeploymentKind;

    async fn backend_for(server: &mockito::ServerGuard) -> HttpBackend {
        HttpBackend::new(
            HttpBackendConfig {
                endpoint: server.url(),
                request_timeout: Duration::from_secs(5),
                api_token: None,
            },
            Arc::new(ChatOpsConfig::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_start_canary_posts_percentage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/applications/porttrack/deployments")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"canary_percentage":30,"description":"Canary deployment 30%"}"#.to_string(),
            ))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"deployment_id":"d-ABC123","kind":"canary","percentage":30,"created_at":"2024-01-01T08:00:00Z"}"#,
            )
            .create_async()
            .await;

        let backend = backend_for(&server).await;
        let record = backend
            .start_canary(&CanaryRequest::new(30, "alice"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.deployment_id, "d-ABC123");
        assert_eq!(record.kind, DeploymentKind::Canary);
    }

    #[tokio::test]
    async fn test_throttling_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/v1/autoscaling-groups/porttrack-asg/desired-capacity")
            .with_status(429)
            .with_body("Rate exceeded")
            .create_async()
            .await;

        let backend = backend_for(&server).await;
        let err = backend.set_desired_capacity(3).await.unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("Rate exceeded"));
    }

    #[tokio::test]
    async fn test_forbidden_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/services/nginx/restart")
            .with_status(403)
            .with_body("AccessDenied")
            .create_async()
            .await;

        let backend = backend_for(&server).await;
        let err = backend.restart_service("nginx").await.unwrap_err();

        assert!(!err.is_transient());
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_list_deployments_sorted_most_recent_first() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/applications/porttrack/deployments")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"deployments":[
                    {"deployment_id":"d-old","kind":"standard","created_at":"2024-01-01T08:00:00Z"},
                    {"deployment_id":"d-new","kind":"canary","percentage":10,"created_at":"2024-01-02T08:00:00Z"}
                ]}"#,
            )
            .create_async()
            .await;

        let backend = backend_for(&server).await;
        let deployments = backend.list_deployments().await.unwrap();

        assert_eq!(deployments[0].deployment_id, "d-new");
        assert_eq!(deployments[1].deployment_id, "d-old");
    }

    #[tokio::test]
    async fn test_garbage_body_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/autoscaling-groups/porttrack-asg")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let backend = backend_for(&server).await;
        let err = backend.describe_group().await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transient() {
        let backend = HttpBackend::new(
            HttpBackendConfig {
                endpoint: "http://127.0.0.1:1".to_string(),
                request_timeout: Duration::from_secs(2),
                api_token: None,
            },
            Arc::new(ChatOpsConfig::default()),
        )
        .unwrap();

        let err = backend.list_deployments().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_frontend_probe_measures_latency() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/health/frontend")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"healthy":true}"#)
            .create_async()
            .await;

        let backend = backend_for(&server).await;
        let reading = backend.probe(Subsystem::Frontend).await.unwrap();

        assert!(reading.healthy);
        assert!(reading.latency_ms.is_some());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = HttpBackend::new(
            HttpBackendConfig {
                endpoint: "not a url".to_string(),
                ..HttpBackendConfig::default()
            },
            Arc::new(ChatOpsConfig::default()),
        );
        assert!(result.is_err());
    }
}
