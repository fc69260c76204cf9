//! Cluster wrappers
//!
//! Reconcilers never work on the raw custom resources. Each wrapper holds
//! an owned, defaulted copy of its resource and derives everything the
//! sync loop needs from it: endpoints, the tenant path, and the ordered
//! set of child resource builders.

use kube::ResourceExt;

use crate::crd::{
    set_database_spec_defaults, set_storage_spec_defaults, Database, Storage, DEFAULT_TAG,
    GRPC_PORT, INTERCONNECT_PORT, REGISTRY_PATH, STATUS_PORT,
};
use crate::resources::builder::{
    config_file_arg, Builder, ConfigMapBuilder, ServiceBuilder, ServiceMonitorBuilder,
    StatefulSetBuilder, DYNAMIC_CONTAINER, STORAGE_CONTAINER,
};
use crate::resources::common::{standard_labels, DYNAMIC_COMPONENT, STORAGE_COMPONENT};
use crate::resources::configuration::{database_config, storage_config};
use crate::resources::monitoring::{database_metric_endpoints, storage_metric_endpoints};

/// A Storage resource with defaults applied
pub struct StorageClusterBuilder {
    pub storage: Storage,
}

impl StorageClusterBuilder {
    /// Take a defaulted copy of the resource.
    pub fn new(storage: &Storage) -> Self {
        let mut storage = storage.clone();
        set_storage_spec_defaults(&mut storage.spec);
        Self { storage }
    }

    pub fn name(&self) -> String {
        self.storage.name_any()
    }

    pub fn namespace(&self) -> String {
        self.storage.namespace().unwrap_or_default()
    }

    /// HTTP status endpoint used by the bootstrap health probe
    pub fn status_endpoint(&self) -> String {
        format!(
            "{}-status.{}.svc.cluster.local:{}",
            self.name(),
            self.namespace(),
            STATUS_PORT
        )
    }

    /// The full ordered child resource set of the cluster
    pub fn resource_builders(&self) -> Vec<Builder> {
        let name = self.name();
        let namespace = self.namespace();
        let labels = standard_labels(&name, STORAGE_COMPONENT);
        let spec = &self.storage.spec;

        let mut builders = cluster_services(&name, labels.clone());

        builders.push(Builder::ConfigMap(ConfigMapBuilder {
            name: name.clone(),
            labels: labels.clone(),
            data: storage_config(&name, &namespace, spec.nodes),
        }));

        builders.push(Builder::StatefulSet(StatefulSetBuilder {
            name: name.clone(),
            labels: labels.clone(),
            replicas: spec.nodes,
            image: image_or_default(&spec.image.name, &spec.version),
            pull_policy: pull_policy_or_default(&spec.image.pull_policy),
            service_name: format!("{}-interconnect", name),
            config_map: name.clone(),
            container_name: STORAGE_CONTAINER,
            args: config_file_arg(),
            data_store: Some(spec.data_store.clone()),
        }));

        for metric in storage_metric_endpoints() {
            builders.push(Builder::ServiceMonitor(ServiceMonitorBuilder {
                name: format!("{}-{}", name, metric.monitor_name),
                labels: labels.clone(),
                selector_labels: labels.clone(),
                metrics_path: metric.path.to_string(),
            }));
        }

        builders
    }
}

/// A Database resource with defaults applied
pub struct DatabaseBuilder {
    pub database: Database,
}

impl DatabaseBuilder {
    /// Take a defaulted copy of the resource.
    pub fn new(database: &Database) -> Self {
        let mut database = database.clone();
        let own_namespace = database.namespace().unwrap_or_default();
        set_database_spec_defaults(&own_namespace, &mut database.spec);
        Self { database }
    }

    pub fn name(&self) -> String {
        self.database.name_any()
    }

    pub fn namespace(&self) -> String {
        self.database.namespace().unwrap_or_default()
    }

    /// Schema path of the tenant inside the storage cluster
    pub fn tenant_name(&self) -> String {
        format!("/Root/{}", self.name())
    }

    /// Name of the referenced Storage resource
    pub fn storage_name(&self) -> String {
        self.database.spec.storage_cluster_ref.name.clone()
    }

    /// Namespace of the referenced Storage resource (defaulted to our own)
    pub fn storage_namespace(&self) -> String {
        self.database
            .spec
            .storage_cluster_ref
            .namespace
            .clone()
            .unwrap_or_else(|| self.namespace())
    }

    /// gRPC endpoint of the referenced storage cluster
    pub fn storage_grpc_endpoint(&self) -> String {
        format!(
            "{}-grpc.{}.svc.cluster.local:{}",
            self.storage_name(),
            self.storage_namespace(),
            GRPC_PORT
        )
    }

    /// The full ordered child resource set of the database
    pub fn resource_builders(&self) -> Vec<Builder> {
        let name = self.name();
        let namespace = self.namespace();
        let labels = standard_labels(&name, DYNAMIC_COMPONENT);
        let spec = &self.database.spec;

        let mut builders = cluster_services(&name, labels.clone());

        builders.push(Builder::ConfigMap(ConfigMapBuilder {
            name: name.clone(),
            labels: labels.clone(),
            data: database_config(&name, &namespace, spec.nodes),
        }));

        let mut args = config_file_arg();
        args.push("--tenant".to_string());
        args.push(self.tenant_name());
        args.push("--node-broker".to_string());
        args.push(format!("grpc://{}", self.storage_grpc_endpoint()));

        builders.push(Builder::StatefulSet(StatefulSetBuilder {
            name: name.clone(),
            labels: labels.clone(),
            replicas: spec.nodes,
            image: image_or_default(&spec.image.name, &spec.version),
            pull_policy: pull_policy_or_default(&spec.image.pull_policy),
            service_name: format!("{}-interconnect", name),
            config_map: name.clone(),
            container_name: DYNAMIC_CONTAINER,
            args,
            data_store: None,
        }));

        for metric in database_metric_endpoints() {
            builders.push(Builder::ServiceMonitor(ServiceMonitorBuilder {
                name: format!("{}-{}", name, metric.monitor_name),
                labels: labels.clone(),
                selector_labels: labels.clone(),
                metrics_path: metric.path.to_string(),
            }));
        }

        builders
    }
}

/// The three Services every cluster exposes: client gRPC, node-to-node
/// interconnect (headless, governs pod DNS), and HTTP status.
fn cluster_services(name: &str, labels: std::collections::BTreeMap<String, String>) -> Vec<Builder> {
    vec![
        Builder::Service(ServiceBuilder {
            name: format!("{}-grpc", name),
            labels: labels.clone(),
            selector: labels.clone(),
            headless: false,
            ports: vec![("grpc", GRPC_PORT)],
        }),
        Builder::Service(ServiceBuilder {
            name: format!("{}-interconnect", name),
            labels: labels.clone(),
            selector: labels.clone(),
            headless: true,
            ports: vec![("interconnect", INTERCONNECT_PORT)],
        }),
        Builder::Service(ServiceBuilder {
            name: format!("{}-status", name),
            labels: labels.clone(),
            selector: labels,
            headless: false,
            ports: vec![("status", STATUS_PORT)],
        }),
    ]
}

fn image_or_default(name: &Option<String>, version: &Option<String>) -> String {
    match name {
        Some(name) => name.clone(),
        None => {
            let tag = version.as_deref().unwrap_or(DEFAULT_TAG);
            format!("{}:{}", REGISTRY_PATH, tag)
        }
    }
}

fn pull_policy_or_default(policy: &Option<String>) -> String {
    policy
        .clone()
        .unwrap_or_else(|| "IfNotPresent".to_string())
}
