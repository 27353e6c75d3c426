//! Health endpoints and the probes registered at boot.

use async_trait::async_trait;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use frontgate_health::{HealthCheck, HealthReport, Probe, Status};
use frontgate_repository::ExampleRepository;
use std::sync::Arc;
use tracing::warn;

use crate::auth::oidc::discovery_url;
use crate::state::AppState;

/// Gates liveness and readiness on the repository answering a ping.
pub struct RepositoryCheck {
    repository: Arc<dyn ExampleRepository>,
}

impl RepositoryCheck {
    #[must_use]
    pub fn new(repository: Arc<dyn ExampleRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl HealthCheck for RepositoryCheck {
    fn label(&self) -> &str {
        "repository"
    }

    fn probe(&self) -> Probe {
        Probe::LIVE | Probe::READY
    }

    async fn check(&self) -> Status {
        self.repository.ping().await.into()
    }
}

/// Gates liveness on the provider's discovery document being reachable.
pub struct IdentityProviderCheck {
    http: reqwest::Client,
    discovery_url: String,
}

impl IdentityProviderCheck {
    #[must_use]
    pub fn new(http: reqwest::Client, issuer_url: &str) -> Self {
        Self {
            http,
            discovery_url: discovery_url(issuer_url),
        }
    }
}

#[async_trait]
impl HealthCheck for IdentityProviderCheck {
    fn label(&self) -> &str {
        "oidc"
    }

    fn probe(&self) -> Probe {
        Probe::LIVE
    }

    async fn check(&self) -> Status {
        match self
            .http
            .get(&self.discovery_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(_) => Status::Active,
            Err(e) => {
                warn!(url = %self.discovery_url, error = %e, "identity provider unreachable");
                Status::Inactive
            }
        }
    }
}

fn respond(report: HealthReport) -> (StatusCode, Json<HealthReport>) {
    let status = if report.is_active() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// `GET /health`: the liveness class.
pub async fn live(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    respond(state.health.evaluate(Probe::LIVE).await)
}

/// `GET /health/ready`: the readiness class.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    respond(state.health.evaluate(Probe::READY).await)
}
