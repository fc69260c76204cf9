//! Cluster configuration rendering
//!
//! Produces the file set mounted into every node at `/opt/stormdb/cfg`:
//! the node configuration itself plus, for storage clusters, the two
//! declarative bootstrap inputs consumed by the admin commands.

use std::collections::BTreeMap;

use crate::crd::{GRPC_PORT, INTERCONNECT_PORT, STATUS_PORT};

/// Mount point of the rendered configuration inside node containers
pub const CFG_DIR: &str = "/opt/stormdb/cfg";

/// Box-definition file consumed by the first bootstrap command
pub const DEFINE_BOX_FILE: &str = "DefineBox.txt";

/// Root-configuration script consumed by the second bootstrap command
pub const CONFIGURE_ROOT_FILE: &str = "ConfigureRoot.txt";

/// Node configuration file name
pub const CONFIG_FILE: &str = "config.yaml";

/// Render the configuration files for a storage cluster.
pub fn storage_config(name: &str, namespace: &str, nodes: i32) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert(
        CONFIG_FILE.to_string(),
        node_config(name, namespace, nodes),
    );
    data.insert(DEFINE_BOX_FILE.to_string(), define_box(name, nodes));
    data.insert(CONFIGURE_ROOT_FILE.to_string(), configure_root(nodes));
    data
}

/// Render the configuration files for a database's dynamic nodes.
pub fn database_config(name: &str, namespace: &str, nodes: i32) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert(
        CONFIG_FILE.to_string(),
        node_config(name, namespace, nodes),
    );
    data
}

fn node_config(name: &str, namespace: &str, nodes: i32) -> String {
    let mut hosts = String::new();
    for i in 0..nodes {
        hosts.push_str(&format!(
            "  - host: {name}-{i}.{name}-interconnect.{namespace}.svc.cluster.local\n    node_id: {id}\n",
            name = name,
            i = i,
            namespace = namespace,
            id = i + 1,
        ));
    }

    format!(
        "domain: Root\n\
         hosts:\n{hosts}\
         grpc_port: {grpc}\n\
         interconnect_port: {ic}\n\
         monitoring_port: {status}\n",
        hosts = hosts,
        grpc = GRPC_PORT,
        ic = INTERCONNECT_PORT,
        status = STATUS_PORT,
    )
}

fn define_box(name: &str, nodes: i32) -> String {
    let mut hosts = String::new();
    for i in 0..nodes {
        hosts.push_str(&format!(
            "    Host {{ Key {{ Fqdn: \"{}-{}\" IcPort: {} }} HostConfigId: 1 }}\n",
            name, i, INTERCONNECT_PORT
        ));
    }

    format!(
        "DefineBox {{\n  BoxId: 1\n{}}}\n",
        hosts
    )
}

fn configure_root(nodes: i32) -> String {
    format!(
        "ConfigureRequest {{\n  \
           Actions {{ AddConfigItem {{ ConfigItem {{ Config {{ \
           DomainsConfig {{ StateStorage {{ Ring {{ NToSelect: {} }} }} }} \
           }} }} }} }}\n}}\n",
        nodes.min(9)
    )
}
