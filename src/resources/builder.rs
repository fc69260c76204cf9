//! Child resource builders
//!
//! Each builder knows how to shape one child resource of a cluster. The
//! closed [`Builder`] enum lets the reconcilers iterate over a cluster's
//! full resource set and sync every member through the apply engine in a
//! fixed order.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
    Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::Client;

use crate::controller::error::Result;
use crate::crd::{VolumeSpec, GRPC_PORT, INTERCONNECT_PORT, STATUS_PORT};
use crate::resources::apply::apply_or_create;
use crate::resources::configuration::{CFG_DIR, CONFIG_FILE};
use crate::resources::monitoring::{
    MonitorEndpoint, MonitorSelector, ServiceMonitor, ServiceMonitorSpec,
};

/// Container name of storage nodes
pub const STORAGE_CONTAINER: &str = "stormdb-storage";

/// Container name of dynamic nodes
pub const DYNAMIC_CONTAINER: &str = "stormdb-dynamic";

/// Mount path of the node data volume
const DATA_DIR: &str = "/data";

/// A Service exposing one port group of the cluster
pub struct ServiceBuilder {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
    /// Headless services publish pod DNS records instead of a cluster IP
    pub headless: bool,
    /// (port name, port number) pairs
    pub ports: Vec<(&'static str, i32)>,
}

impl ServiceBuilder {
    fn build(&self, svc: &mut Service) -> Result<()> {
        svc.metadata.labels = Some(self.labels.clone());

        let ports = self
            .ports
            .iter()
            .map(|(name, port)| ServicePort {
                name: Some((*name).to_string()),
                port: *port,
                target_port: Some(IntOrString::Int(*port)),
                ..Default::default()
            })
            .collect();

        svc.spec = Some(ServiceSpec {
            cluster_ip: if self.headless {
                Some("None".to_string())
            } else {
                svc.spec.as_ref().and_then(|s| s.cluster_ip.clone())
            },
            selector: Some(self.selector.clone()),
            ports: Some(ports),
            ..Default::default()
        });

        Ok(())
    }
}

/// The ConfigMap carrying the rendered node configuration
pub struct ConfigMapBuilder {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
}

impl ConfigMapBuilder {
    fn build(&self, cm: &mut ConfigMap) -> Result<()> {
        cm.metadata.labels = Some(self.labels.clone());
        cm.data = Some(self.data.clone());
        Ok(())
    }
}

/// The StatefulSet running the cluster's node group
pub struct StatefulSetBuilder {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub replicas: i32,
    pub image: String,
    pub pull_policy: String,
    /// Headless service governing pod DNS
    pub service_name: String,
    /// ConfigMap mounted at the configuration directory
    pub config_map: String,
    /// Container name (storage vs dynamic nodes)
    pub container_name: &'static str,
    /// Arguments appended after the fixed server command
    pub args: Vec<String>,
    /// Persistent data volume, storage nodes only
    pub data_store: Option<VolumeSpec>,
}

impl StatefulSetBuilder {
    fn build(&self, sts: &mut StatefulSet) -> Result<()> {
        sts.metadata.labels = Some(self.labels.clone());

        let mut volume_mounts = vec![VolumeMount {
            name: "config".to_string(),
            mount_path: CFG_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        }];

        let mut volume_claim_templates = None;
        if self.data_store.is_some() {
            volume_mounts.push(VolumeMount {
                name: "data".to_string(),
                mount_path: DATA_DIR.to_string(),
                ..Default::default()
            });
            volume_claim_templates = Some(vec![self.pvc_template()]);
        }

        let container = Container {
            name: self.container_name.to_string(),
            image: Some(self.image.clone()),
            image_pull_policy: Some(self.pull_policy.clone()),
            command: Some(vec![
                crate::cms::STORMDB_BIN.to_string(),
                "server".to_string(),
            ]),
            args: Some(self.args.clone()),
            ports: Some(vec![
                ContainerPort {
                    name: Some("grpc".to_string()),
                    container_port: GRPC_PORT,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("interconnect".to_string()),
                    container_port: INTERCONNECT_PORT,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("status".to_string()),
                    container_port: STATUS_PORT,
                    ..Default::default()
                },
            ]),
            volume_mounts: Some(volume_mounts),
            ..Default::default()
        };

        sts.spec = Some(StatefulSetSpec {
            service_name: self.service_name.clone(),
            replicas: Some(self.replicas),
            selector: LabelSelector {
                match_labels: Some(self.labels.clone()),
                ..Default::default()
            },
            pod_management_policy: Some("Parallel".to_string()),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(self.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: "config".to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: self.config_map.clone(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            volume_claim_templates,
            ..Default::default()
        });

        Ok(())
    }

    fn pvc_template(&self) -> PersistentVolumeClaim {
        // data_store is checked by the caller
        let store = self.data_store.clone().unwrap_or(VolumeSpec {
            size: "0".to_string(),
            storage_class: None,
        });

        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some("data".to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                storage_class_name: store.storage_class,
                resources: Some(VolumeResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(store.size),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// A ServiceMonitor scraping one metric subsystem from the status service
pub struct ServiceMonitorBuilder {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Labels of the status service to scrape
    pub selector_labels: BTreeMap<String, String>,
    pub metrics_path: String,
}

impl ServiceMonitorBuilder {
    fn build(&self, monitor: &mut ServiceMonitor) -> Result<()> {
        monitor.metadata.labels = Some(self.labels.clone());
        monitor.spec = ServiceMonitorSpec {
            selector: MonitorSelector {
                match_labels: self.selector_labels.clone(),
            },
            endpoints: vec![MonitorEndpoint {
                port: "status".to_string(),
                path: Some(self.metrics_path.clone()),
                interval: Some("15s".to_string()),
            }],
        };
        Ok(())
    }
}

/// The closed set of child resources a cluster can own
pub enum Builder {
    Service(ServiceBuilder),
    ConfigMap(ConfigMapBuilder),
    StatefulSet(StatefulSetBuilder),
    ServiceMonitor(ServiceMonitorBuilder),
}

impl Builder {
    /// Deterministic object name, derived from the owner's name
    pub fn name(&self) -> &str {
        match self {
            Builder::Service(b) => &b.name,
            Builder::ConfigMap(b) => &b.name,
            Builder::StatefulSet(b) => &b.name,
            Builder::ServiceMonitor(b) => &b.name,
        }
    }

    /// Sync the resource through the apply engine. Returns whether the
    /// object had to be created.
    pub async fn sync(
        &self,
        client: &Client,
        namespace: &str,
        owner: &OwnerReference,
    ) -> Result<bool> {
        match self {
            Builder::Service(b) => {
                apply_or_create::<Service, _>(client, namespace, &b.name, owner, |svc| {
                    b.build(svc)
                })
                .await
            }
            Builder::ConfigMap(b) => {
                apply_or_create::<ConfigMap, _>(client, namespace, &b.name, owner, |cm| {
                    b.build(cm)
                })
                .await
            }
            Builder::StatefulSet(b) => {
                apply_or_create::<StatefulSet, _>(client, namespace, &b.name, owner, |sts| {
                    b.build(sts)
                })
                .await
            }
            Builder::ServiceMonitor(b) => {
                apply_or_create::<ServiceMonitor, _>(client, namespace, &b.name, owner, |m| {
                    b.build(m)
                })
                .await
            }
        }
    }
}

/// Server argument pointing at the mounted configuration file
pub fn config_file_arg() -> Vec<String> {
    vec![
        "--config".to_string(),
        format!("{}/{}", CFG_DIR, CONFIG_FILE),
    ]
}
