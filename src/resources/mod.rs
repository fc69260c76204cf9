//! Kubernetes child resource generation and the idempotent apply engine

pub mod apply;
pub mod builder;
pub mod common;
pub mod configuration;
pub mod monitoring;
pub mod wrapper;

pub use apply::apply_or_create;
pub use builder::{Builder, DYNAMIC_CONTAINER, STORAGE_CONTAINER};
pub use common::{
    owner_reference, pod_selector, standard_labels, CLUSTER_LABEL, COMPONENT_LABEL,
    DYNAMIC_COMPONENT, FIELD_MANAGER, STORAGE_COMPONENT,
};
pub use monitoring::ServiceMonitor;
pub use wrapper::{DatabaseBuilder, StorageClusterBuilder};
