//! Single-shot liveness checks
//!
//! A probe never fails: connection errors, timeouts, non-2xx statuses and
//! unexpected bodies all collapse into [`HealthStatus::Unhealthy`].

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::ServiceSpec;

/// Outcome of one health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// Liveness check for one service
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, service: &ServiceSpec) -> HealthStatus;
}

/// HTTP GET against the service's `health_url`
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpHealthProbe {
    /// Create a probe with the given per-check timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, service: &ServiceSpec) -> Result<(), String> {
        let response = self
            .client
            .get(&service.health_url)
            .send()
            .await
            .map_err(|e| describe_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        if let Some(expected) = &service.expect_body {
            let body = response
                .text()
                .await
                .map_err(|e| format!("unreadable body: {e}"))?;
            if !body.contains(expected.as_str()) {
                return Err(format!("body does not contain '{expected}'"));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, service: &ServiceSpec) -> HealthStatus {
        let status = match tokio::time::timeout(self.timeout, self.fetch(service)).await {
            Ok(Ok(())) => HealthStatus::Healthy,
            Ok(Err(reason)) => HealthStatus::Unhealthy(reason),
            Err(_) => HealthStatus::Unhealthy(format!("timed out after {:?}", self.timeout)),
        };

        debug!(service = %service.id, url = %service.health_url, %status, "[Health Check] probe finished");
        status
    }
}

fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused".to_string()
    } else if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_builder() {
        format!("invalid health url: {error}")
    } else {
        error.to_string()
    }
}
