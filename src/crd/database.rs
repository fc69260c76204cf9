//! Database CRD definition
//!
//! A Database resource declares a tenant workload bound to an existing
//! Storage cluster. The operator runs a group of dynamic nodes for the
//! tenant and creates the tenant itself through the cluster's management
//! console once the nodes are up.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::storage::{ClusterState, Condition, ImageSpec, DEFAULT_TAG, REGISTRY_PATH};

/// Database is the Schema for the databases API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "stormdb.io",
    version = "v1alpha1",
    kind = "Database",
    plural = "databases",
    shortname = "sdb",
    namespaced,
    status = "DatabaseStatus",
    printcolumn = r#"{"name":"Storage", "type":"string", "jsonPath":".spec.storageClusterRef.name"}"#,
    printcolumn = r#"{"name":"Nodes", "type":"integer", "jsonPath":".spec.nodes"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Number of dynamic nodes serving this tenant
    #[serde(default = "default_nodes")]
    pub nodes: i32,

    /// Reference to the Storage cluster this tenant lives in
    pub storage_cluster_ref: StorageRef,

    /// Container image configuration
    #[serde(default)]
    pub image: ImageSpec,

    /// StormDB version tag, used to derive the image when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn default_nodes() -> i32 {
    1
}

/// Reference to a Storage resource by name and namespace
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageRef {
    /// Name of the Storage resource
    pub name: String,

    /// Namespace of the Storage resource (defaults to the Database's own)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Status of a Database
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: ClusterState,

    /// Completion markers, keyed by type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Fill spec fields the user left empty.
///
/// An empty storage-ref namespace resolves to the Database's own namespace,
/// so the reconciler always sees a fully-qualified reference.
pub fn set_database_spec_defaults(own_namespace: &str, spec: &mut DatabaseSpec) {
    if spec.storage_cluster_ref.namespace.is_none() {
        spec.storage_cluster_ref.namespace = Some(own_namespace.to_string());
    }

    if spec.image.name.is_none() {
        let tag = spec.version.as_deref().unwrap_or(DEFAULT_TAG);
        spec.image.name = Some(format!("{}:{}", REGISTRY_PATH, tag));
    }

    if spec.image.pull_policy.is_none() {
        spec.image.pull_policy = Some("IfNotPresent".to_string());
    }
}
