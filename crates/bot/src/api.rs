//! HTTP API: chat transport, health checks and Prometheus metrics

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bot_lib::{
    command::{ChatRequest, Orchestrator, Reply},
    health::{ComponentStatus, HealthRegistry},
    CommandOutcome,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, health_registry: HealthRegistry) -> Self {
        Self {
            orchestrator,
            health_registry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// False when the text was not a bot command
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CommandOutcome>,
    pub replies: Vec<String>,
}

/// Replies gathered during one request, returned in the response body
#[derive(Default)]
struct CollectedReplies {
    lines: Mutex<Vec<String>>,
}

impl CollectedReplies {
    fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Reply for CollectedReplies {
    async fn reply(&self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
    }
}

/// Handle one chat message and return the bot's replies.
///
/// The command runs on its own task so a dropped connection cannot cancel
/// it once backend calls are underway.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let replies = Arc::new(CollectedReplies::default());
    let orchestrator = state.orchestrator.clone();
    let collector = replies.clone();

    let task =
        tokio::spawn(async move { orchestrator.handle(&request, &*collector).await });

    match task.await {
        Ok(outcome) => Json(ChatResponse {
            handled: outcome.is_some(),
            outcome,
            replies: replies.lines(),
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Chat command task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    handled: true,
                    outcome: None,
                    replies: replies.lines(),
                }),
            )
                .into_response()
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still answering commands
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` completes
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
