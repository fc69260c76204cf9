//! Bootstrap health probe
//!
//! Before the one-shot bootstrap commands run, the storage cluster must
//! answer on its status endpoint. Any probe failure is interpreted as
//! "not yet healthy" and translated by the reconciler into a timed
//! requeue, never into a controller error.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors reported by the bootstrap health probe
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("health probe request failed: {0}")]
    ProbeFailed(#[from] reqwest::Error),

    #[error("status endpoint answered {0}")]
    Unhealthy(String),
}

/// Probe a cluster's bootstrap health status.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Returns Ok(()) once the cluster is healthy enough to bootstrap.
    async fn check_bootstrap_health(&self, status_endpoint: &str) -> Result<(), HealthError>;
}

/// Checker probing the HTTP status endpoint of the first storage node group.
pub struct StatusEndpointChecker {
    http: reqwest::Client,
}

impl StatusEndpointChecker {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for StatusEndpointChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthChecker for StatusEndpointChecker {
    async fn check_bootstrap_health(&self, status_endpoint: &str) -> Result<(), HealthError> {
        let url = format!("http://{}/ping", status_endpoint);
        debug!(url = %url, "Probing bootstrap health");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(HealthError::Unhealthy(response.status().to_string()));
        }

        Ok(())
    }
}
