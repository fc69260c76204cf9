//! Tenant provisioning through the cluster management console
//!
//! A tenant is a logical database namespace inside the Storage cluster.
//! Creation goes through the console of the storage layer itself, run as
//! an administrative command in the cluster's first member. The command is
//! idempotent at the target: re-creating an existing tenant succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::exec::{ExecError, PodExecutor};
use crate::resources::STORAGE_CONTAINER;

/// StormDB binary path inside the node containers
pub const STORMDB_BIN: &str = "/opt/stormdb/bin/stormdb";

/// Default storage pool assigned to a freshly-created tenant
const DEFAULT_STORAGE_POOL: &str = "ssd:1";

/// Errors reported by tenant provisioning
#[derive(Error, Debug)]
pub enum TenantError {
    #[error("tenant console command failed: {0}")]
    ExecError(#[from] ExecError),
}

/// Create a tenant inside a Storage cluster.
#[async_trait]
pub trait TenantProvisioner: Send + Sync {
    async fn create_tenant(
        &self,
        storage_name: &str,
        storage_namespace: &str,
        tenant_path: &str,
    ) -> Result<(), TenantError>;
}

/// Provisioner running the admin console command in the storage cluster's
/// first member.
pub struct ConsoleTenantClient {
    executor: Arc<dyn PodExecutor>,
}

impl ConsoleTenantClient {
    pub fn new(executor: Arc<dyn PodExecutor>) -> Self {
        Self { executor }
    }
}

/// Console command creating the tenant with the default storage pool.
pub fn create_tenant_command(tenant_path: &str) -> Vec<String> {
    vec![
        STORMDB_BIN.to_string(),
        "admin".to_string(),
        "database".to_string(),
        tenant_path.to_string(),
        "create".to_string(),
        DEFAULT_STORAGE_POOL.to_string(),
    ]
}

#[async_trait]
impl TenantProvisioner for ConsoleTenantClient {
    async fn create_tenant(
        &self,
        storage_name: &str,
        storage_namespace: &str,
        tenant_path: &str,
    ) -> Result<(), TenantError> {
        let pod = format!("{}-0", storage_name);
        let command = create_tenant_command(tenant_path);

        self.executor
            .exec(storage_namespace, &pod, STORAGE_CONTAINER, &command)
            .await?;

        info!(tenant = %tenant_path, storage = %storage_name, "Tenant created");
        Ok(())
    }
}
