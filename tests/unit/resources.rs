//! Child resource generation for Storage and Database clusters

use kube::core::ObjectMeta;
use stormdb_operator::crd::{
    Database, DatabaseSpec, ImageSpec, Storage, StorageRef, StorageSpec, VolumeSpec,
};
use stormdb_operator::resources::builder::Builder;
use stormdb_operator::resources::configuration::{
    CONFIGURE_ROOT_FILE, CONFIG_FILE, DEFINE_BOX_FILE,
};
use stormdb_operator::resources::{
    DatabaseBuilder, StorageClusterBuilder, DYNAMIC_CONTAINER, STORAGE_CONTAINER,
};

fn storage(name: &str, namespace: &str, nodes: i32) -> Storage {
    Storage {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: StorageSpec {
            nodes,
            image: ImageSpec::default(),
            version: None,
            data_store: VolumeSpec {
                size: "100Gi".to_string(),
                storage_class: Some("fast".to_string()),
            },
        },
        status: None,
    }
}

fn database(name: &str, namespace: &str, storage_name: &str) -> Database {
    Database {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: DatabaseSpec {
            nodes: 2,
            storage_cluster_ref: StorageRef {
                name: storage_name.to_string(),
                namespace: None,
            },
            image: ImageSpec::default(),
            version: Some("24.4.0".to_string()),
        },
        status: None,
    }
}

fn find_statefulset(builders: &[Builder]) -> &stormdb_operator::resources::builder::StatefulSetBuilder {
    builders
        .iter()
        .find_map(|b| match b {
            Builder::StatefulSet(sts) => Some(sts),
            _ => None,
        })
        .expect("resource set must contain a StatefulSet")
}

fn find_configmap(builders: &[Builder]) -> &stormdb_operator::resources::builder::ConfigMapBuilder {
    builders
        .iter()
        .find_map(|b| match b {
            Builder::ConfigMap(cm) => Some(cm),
            _ => None,
        })
        .expect("resource set must contain a ConfigMap")
}

#[test]
fn test_storage_resource_names_are_deterministic() {
    let cluster = StorageClusterBuilder::new(&storage("st", "prod", 3));
    let builders = cluster.resource_builders();
    let names: Vec<&str> = builders.iter().map(|b| b.name()).collect();

    assert!(names.contains(&"st-grpc"));
    assert!(names.contains(&"st-interconnect"));
    assert!(names.contains(&"st-status"));
    assert!(names.contains(&"st"));

    // Two invocations build the identical set.
    let again: Vec<String> = cluster
        .resource_builders()
        .iter()
        .map(|b| b.name().to_string())
        .collect();
    assert_eq!(names, again.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn test_storage_statefulset_uses_storage_container_and_volume() {
    let cluster = StorageClusterBuilder::new(&storage("st", "prod", 3));
    let builders = cluster.resource_builders();
    let sts = find_statefulset(&builders);

    assert_eq!(sts.container_name, STORAGE_CONTAINER);
    assert_eq!(sts.replicas, 3);
    assert_eq!(sts.service_name, "st-interconnect");
    let store = sts.data_store.as_ref().expect("storage nodes need a PVC");
    assert_eq!(store.size, "100Gi");
    assert_eq!(store.storage_class.as_deref(), Some("fast"));
}

#[test]
fn test_storage_configmap_carries_bootstrap_inputs() {
    let cluster = StorageClusterBuilder::new(&storage("st", "prod", 3));
    let builders = cluster.resource_builders();
    let cm = find_configmap(&builders);

    assert!(cm.data.contains_key(CONFIG_FILE));
    assert!(cm.data.contains_key(DEFINE_BOX_FILE));
    assert!(cm.data.contains_key(CONFIGURE_ROOT_FILE));

    let config = &cm.data[CONFIG_FILE];
    assert!(config.contains("st-0.st-interconnect.prod.svc.cluster.local"));
    assert!(config.contains("st-2.st-interconnect.prod.svc.cluster.local"));
}

#[test]
fn test_database_statefulset_points_at_storage_cluster() {
    let builder = DatabaseBuilder::new(&database("db", "prod", "st"));
    let builders = builder.resource_builders();
    let sts = find_statefulset(&builders);

    assert_eq!(sts.container_name, DYNAMIC_CONTAINER);
    assert_eq!(sts.replicas, 2);
    assert!(sts.data_store.is_none());

    let args = sts.args.join(" ");
    assert!(args.contains("--tenant /Root/db"));
    assert!(args.contains("--node-broker grpc://st-grpc.prod.svc.cluster.local:2135"));
}

#[test]
fn test_database_version_overrides_image_tag() {
    let builder = DatabaseBuilder::new(&database("db", "prod", "st"));
    let builders = builder.resource_builders();
    let sts = find_statefulset(&builders);

    assert_eq!(sts.image, "docker.io/stormdb/stormdb:24.4.0");
}

#[test]
fn test_database_configmap_has_no_bootstrap_inputs() {
    let builder = DatabaseBuilder::new(&database("db", "prod", "st"));
    let builders = builder.resource_builders();
    let cm = find_configmap(&builders);

    assert!(cm.data.contains_key(CONFIG_FILE));
    assert!(!cm.data.contains_key(DEFINE_BOX_FILE));
    assert!(!cm.data.contains_key(CONFIGURE_ROOT_FILE));
}
