//! Storage CRD definition
//!
//! A Storage resource declares the desired shape of a StormDB storage
//! cluster: a fixed-size group of storage nodes backed by a StatefulSet.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// gRPC port exposed by every StormDB node
pub const GRPC_PORT: i32 = 2135;

/// Node-to-node interconnect port
pub const INTERCONNECT_PORT: i32 = 19001;

/// HTTP status/monitoring port
pub const STATUS_PORT: i32 = 8765;

/// Default image registry path
pub const REGISTRY_PATH: &str = "docker.io/stormdb/stormdb";

/// Image tag used when neither an image nor a version is given
pub const DEFAULT_TAG: &str = "24.3.1";

/// Storage is the Schema for the storages API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "stormdb.io",
    version = "v1alpha1",
    kind = "Storage",
    plural = "storages",
    shortname = "sst",
    namespaced,
    status = "StorageStatus",
    printcolumn = r#"{"name":"Nodes", "type":"integer", "jsonPath":".spec.nodes"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Number of storage nodes (static nodes running the storage layer)
    #[serde(default = "default_nodes")]
    pub nodes: i32,

    /// Container image configuration
    #[serde(default)]
    pub image: ImageSpec,

    /// StormDB version tag, used to derive the image when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Persistent volume configuration for node data
    pub data_store: VolumeSpec,
}

fn default_nodes() -> i32 {
    3
}

/// Container image configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Full image reference; derived from `version` when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Image pull policy (default: IfNotPresent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
}

/// Persistent volume configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Size of the persistent volume (e.g. "10Gi")
    pub size: String,

    /// Storage class name (uses the cluster default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// Status of a Storage cluster
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    /// Current lifecycle state
    #[serde(default)]
    pub state: ClusterState,

    /// Completion markers, keyed by type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Lifecycle state shared by Storage and Database resources
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum ClusterState {
    /// Not yet reconciled
    #[default]
    Pending,
    /// Waiting for the node group to scale up
    Provisioning,
    /// One-shot initialization in progress (Database only)
    Initializing,
    /// Converged and verified healthy
    Ready,
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterState::Pending => write!(f, "Pending"),
            ClusterState::Provisioning => write!(f, "Provisioning"),
            ClusterState::Initializing => write!(f, "Initializing"),
            ClusterState::Ready => write!(f, "Ready"),
        }
    }
}

/// A named boolean fact persisted on a resource's status.
///
/// Conditions are uniquely keyed by `type_` and act as one-shot completion
/// markers across otherwise stateless reconcile invocations.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Reason for the condition's last transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,
}

/// Fill spec fields the user left empty.
pub fn set_storage_spec_defaults(spec: &mut StorageSpec) {
    if spec.image.name.is_none() {
        let tag = spec.version.as_deref().unwrap_or(DEFAULT_TAG);
        spec.image.name = Some(format!("{}:{}", REGISTRY_PATH, tag));
    }

    if spec.image.pull_policy.is_none() {
        spec.image.pull_policy = Some("IfNotPresent".to_string());
    }
}
