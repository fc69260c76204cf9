//! Status writer
//!
//! State transitions are persisted by re-fetching the resource, overlaying
//! the new state and condition ledger onto whatever status it carries, and
//! patching the status subresource. The re-fetch keeps concurrent ledger
//! updates from being clobbered by a stale in-memory copy.

use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::{Patch, PatchParams};
use kube::runtime::events::EventType;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::info;

use crate::controller::error::{Error, Result};
use crate::controller::events::{reasons, EventPublisher};
use crate::crd::{ClusterState, Condition, Database, Storage};
use crate::resources::FIELD_MANAGER;

/// Persist a Storage state transition.
pub async fn set_storage_state(
    client: &Client,
    events: &dyn EventPublisher,
    storage: &Storage,
    state: ClusterState,
    conditions: &[Condition],
) -> Result<()> {
    let namespace = storage
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = storage.name_any();
    let api: Api<Storage> = Api::namespaced(client.clone(), &namespace);

    let result = write_storage_status(&api, &name, state, conditions).await;
    if let Err(e) = &result {
        report_status_failure(events, &storage.object_ref(&()), e).await;
    }
    result
}

/// Persist a Database state transition.
pub async fn set_database_state(
    client: &Client,
    events: &dyn EventPublisher,
    database: &Database,
    state: ClusterState,
    conditions: &[Condition],
) -> Result<()> {
    let namespace = database
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = database.name_any();
    let api: Api<Database> = Api::namespaced(client.clone(), &namespace);

    let result = write_database_status(&api, &name, state, conditions).await;
    if let Err(e) = &result {
        report_status_failure(events, &database.object_ref(&()), e).await;
    }
    result
}

async fn write_storage_status(
    api: &Api<Storage>,
    name: &str,
    state: ClusterState,
    conditions: &[Condition],
) -> Result<()> {
    let fresh = api.get(name).await?;
    let mut status = fresh.status.unwrap_or_default();
    let old_state = status.state;
    status.state = state;
    status.conditions = conditions.to_vec();

    patch_status(api, name, &status).await?;
    if old_state != state {
        info!(storage = %name, from = %old_state, to = %state, "State transition");
    }
    Ok(())
}

async fn write_database_status(
    api: &Api<Database>,
    name: &str,
    state: ClusterState,
    conditions: &[Condition],
) -> Result<()> {
    let fresh = api.get(name).await?;
    let mut status = fresh.status.unwrap_or_default();
    let old_state = status.state;
    status.state = state;
    status.conditions = conditions.to_vec();

    patch_status(api, name, &status).await?;
    if old_state != state {
        info!(database = %name, from = %old_state, to = %state, "State transition");
    }
    Ok(())
}

async fn patch_status<K, S>(api: &Api<K>, name: &str, status: &S) -> Result<()>
where
    K: Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
    S: serde::Serialize,
{
    let patch = serde_json::json!({ "status": status });
    api.patch_status(
        name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

async fn report_status_failure(
    events: &dyn EventPublisher,
    resource_ref: &ObjectReference,
    error: &Error,
) {
    events
        .publish(
            resource_ref,
            EventType::Warning,
            reasons::CONTROLLER_ERROR,
            "StatusUpdate",
            Some(format!("Failed to persist status: {}", error)),
        )
        .await;
}
