pub mod cms;
pub mod controller;
pub mod crd;
pub mod exec;
pub mod healthcheck;
pub mod resources;

pub use controller::{
    database_error_policy, error_policy, reconcile, reconcile_database, Context, DatabaseContext,
    Error, Result,
};
pub use crd::{Database, Storage};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

/// Run the Storage controller (cluster-wide).
///
/// Watches Storage resources plus the owned StatefulSets, Services and
/// ConfigMaps so child changes re-trigger reconciliation.
pub async fn run_storage_controller(client: Client) {
    tracing::info!("Starting controller for Storage resources (apiVersion: stormdb.io/v1alpha1)");

    let ctx = Arc::new(Context::new(client.clone()));

    let storages: Api<Storage> = Api::all(client.clone());
    let statefulsets: Api<StatefulSet> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client.clone());
    let configmaps: Api<ConfigMap> = Api::all(client);

    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(storages, watcher_config.clone())
        .owns(statefulsets, watcher_config.clone())
        .owns(services, watcher_config.clone())
        .owns(configmaps, watcher_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled Storage: {}", obj.name);
                }
                Err(e) => {
                    // NotFound after deletion is expected when watch events
                    // race the owner's removal.
                    let is_not_found = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _)
                            if format!("{:?}", err).contains("NotFound")
                    );
                    if is_not_found {
                        tracing::debug!("Storage object no longer exists: {:?}", e);
                    } else {
                        tracing::error!("Storage reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::error!("Storage controller stream ended unexpectedly");
}

/// Run the Database controller (cluster-wide).
pub async fn run_database_controller(client: Client) {
    tracing::info!("Starting controller for Database resources (apiVersion: stormdb.io/v1alpha1)");

    let ctx = Arc::new(DatabaseContext::new(client.clone()));

    let databases: Api<Database> = Api::all(client.clone());
    let statefulsets: Api<StatefulSet> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client.clone());
    let configmaps: Api<ConfigMap> = Api::all(client);

    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(databases, watcher_config.clone())
        .owns(statefulsets, watcher_config.clone())
        .owns(services, watcher_config.clone())
        .owns(configmaps, watcher_config)
        .run(reconcile_database, database_error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled Database: {}", obj.name);
                }
                Err(e) => {
                    let is_not_found = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _)
                            if format!("{:?}", err).contains("NotFound")
                    );
                    if is_not_found {
                        tracing::debug!("Database object no longer exists: {:?}", e);
                    } else {
                        tracing::error!("Database reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::error!("Database controller stream ended unexpectedly");
}
