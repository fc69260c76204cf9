//! Shared reconciler state
//!
//! Everything a reconcile invocation needs beyond the resource itself is
//! injected here. Collaborators sit behind traits so tests can substitute
//! them without a cluster.

use std::sync::Arc;

use kube::Client;

use crate::cms::{ConsoleTenantClient, TenantProvisioner};
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::exec::{KubePodExecutor, PodExecutor};
use crate::healthcheck::{HealthChecker, StatusEndpointChecker};
use crate::resources::FIELD_MANAGER;

/// Context passed to the Storage reconciler
pub struct Context {
    pub client: Client,
    pub events: Arc<dyn EventPublisher>,
    pub executor: Arc<dyn PodExecutor>,
    pub health: Arc<dyn HealthChecker>,
}

impl Context {
    pub fn new(client: Client) -> Self {
        Self {
            events: Arc::new(KubeEventPublisher::new(client.clone(), FIELD_MANAGER)),
            executor: Arc::new(KubePodExecutor::new(client.clone())),
            health: Arc::new(StatusEndpointChecker::new()),
            client,
        }
    }
}

/// Context passed to the Database reconciler
pub struct DatabaseContext {
    pub client: Client,
    pub events: Arc<dyn EventPublisher>,
    pub tenants: Arc<dyn TenantProvisioner>,
}

impl DatabaseContext {
    pub fn new(client: Client) -> Self {
        let executor = Arc::new(KubePodExecutor::new(client.clone()));
        Self {
            events: Arc::new(KubeEventPublisher::new(client.clone(), FIELD_MANAGER)),
            tenants: Arc::new(ConsoleTenantClient::new(executor)),
            client,
        }
    }
}
