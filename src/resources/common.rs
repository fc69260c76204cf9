//! Common utilities for Kubernetes resource generation
//!
//! Shared labels, owner-reference construction, and naming helpers used by
//! every child-resource builder.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;

/// Operator field manager name
pub const FIELD_MANAGER: &str = "stormdb-operator";

/// Label carrying the owning cluster's name
pub const CLUSTER_LABEL: &str = "stormdb.io/cluster";

/// Label distinguishing storage nodes from dynamic (tenant) nodes
pub const COMPONENT_LABEL: &str = "stormdb.io/component";

/// Component value for storage nodes
pub const STORAGE_COMPONENT: &str = "storage-node";

/// Component value for dynamic nodes
pub const DYNAMIC_COMPONENT: &str = "dynamic-node";

/// Generate an owner reference pointing back at the top-level resource.
///
/// Child resources carrying this reference are garbage collected by the
/// API server when the owner is deleted.
pub fn owner_reference<K>(owner: &K) -> OwnerReference
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
{
    OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: owner.name_any(),
        uid: owner.meta().uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Standard labels for all resources belonging to a cluster
pub fn standard_labels(cluster_name: &str, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            cluster_name.to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
        (CLUSTER_LABEL.to_string(), cluster_name.to_string()),
        (COMPONENT_LABEL.to_string(), component.to_string()),
    ])
}

/// Label selector string matching the member pods of a cluster
pub fn pod_selector(cluster_name: &str, component: &str) -> String {
    format!(
        "app.kubernetes.io/name={},{}={}",
        cluster_name, COMPONENT_LABEL, component
    )
}
