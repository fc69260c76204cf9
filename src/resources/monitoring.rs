//! ServiceMonitor CRD type
//!
//! Local typed definition of the Prometheus Operator's ServiceMonitor so
//! monitoring hooks flow through the same typed apply engine as the other
//! child resources.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ServiceMonitor selects services to scrape metrics from
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "monitoring.coreos.com",
    version = "v1",
    kind = "ServiceMonitor",
    plural = "servicemonitors",
    namespaced,
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    /// Selector matching the services to monitor
    pub selector: MonitorSelector,

    /// Scrape endpoints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<MonitorEndpoint>,
}

/// Label selector for monitored services
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

/// A single scrape endpoint
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorEndpoint {
    /// Named port on the selected service
    pub port: String,

    /// Metrics path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Scrape interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// A metric subsystem exposed on the status port
pub struct MetricEndpoint {
    /// Suffix appended to the owner's name for the monitor object
    pub monitor_name: &'static str,
    /// Counter path under the status endpoint
    pub path: &'static str,
}

/// Metric subsystems scraped from storage nodes
pub fn storage_metric_endpoints() -> Vec<MetricEndpoint> {
    vec![
        MetricEndpoint {
            monitor_name: "storage",
            path: "/counters/storage",
        },
        MetricEndpoint {
            monitor_name: "grpc",
            path: "/counters/grpc",
        },
    ]
}

/// Metric subsystems scraped from dynamic nodes
pub fn database_metric_endpoints() -> Vec<MetricEndpoint> {
    vec![MetricEndpoint {
        monitor_name: "tenant",
        path: "/counters/tenant",
    }]
}
