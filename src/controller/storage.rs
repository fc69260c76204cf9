//! Storage reconciler
//!
//! Drives a Storage cluster through its convergence sequence:
//! scale-wait, resource sync, bootstrap health check, one-shot bootstrap
//! commands, ready. Every phase is idempotent; the sequence short-circuits
//! on the first phase that requests a requeue.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Resource, ResourceExt};
use tracing::{error, info, instrument, warn};

use crate::cms::STORMDB_BIN;
use crate::controller::conditions::{
    condition_status, is_condition_true, set_condition, STORAGE_INITIALIZED_CONDITION,
};
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::events::reasons;
use crate::controller::outcome::{
    PhaseOutcome, BOOTSTRAP_RETRY_DELAY, HEALTHCHECK_RETRY_DELAY, SCALE_REQUEUE_DELAY,
};
use crate::controller::status::set_storage_state;
use crate::crd::{ClusterState, Condition, Storage};
use crate::resources::configuration::{CFG_DIR, CONFIGURE_ROOT_FILE, DEFINE_BOX_FILE};
use crate::resources::{
    owner_reference, pod_selector, StorageClusterBuilder, STORAGE_COMPONENT, STORAGE_CONTAINER,
};

/// First bootstrap command: apply the declarative box definition
pub fn define_box_command() -> Vec<String> {
    vec![
        STORMDB_BIN.to_string(),
        "admin".to_string(),
        "bs".to_string(),
        "config".to_string(),
        "invoke".to_string(),
        "--proto-file".to_string(),
        format!("{}/{}", CFG_DIR, DEFINE_BOX_FILE),
    ]
}

/// Second bootstrap command: execute the root-domain configuration script
pub fn configure_root_command() -> Vec<String> {
    vec![
        STORMDB_BIN.to_string(),
        "admin".to_string(),
        "console".to_string(),
        "execute".to_string(),
        "--domain=Root".to_string(),
        "--retry=10".to_string(),
        format!("{}/{}", CFG_DIR, CONFIGURE_ROOT_FILE),
    ]
}

/// Decision of the scale-wait phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Running member count does not match the desired node count
    WaitForScale { running: i32, desired: i32 },
    /// Scaled and initialized but not yet marked Ready
    MarkReady,
    /// Scaled; nothing to change here
    Settled,
}

/// Pure scale-wait decision, shared by both reconcilers.
///
/// Under-scale after Ready is an explicit regression back to Provisioning,
/// never silently ignored.
pub fn scale_decision(
    running: i32,
    desired: i32,
    state: ClusterState,
    initialized: bool,
) -> ScaleDecision {
    if running != desired {
        ScaleDecision::WaitForScale { running, desired }
    } else if initialized && state != ClusterState::Ready {
        ScaleDecision::MarkReady
    } else {
        ScaleDecision::Settled
    }
}

#[instrument(skip(storage, ctx), fields(name = %storage.name_any(), namespace = storage.namespace().unwrap_or_default()))]
pub async fn reconcile(storage: Arc<Storage>, ctx: Arc<Context>) -> Result<Action> {
    info!("Reconciling Storage");
    let outcome = sync(&storage, &ctx).await?;
    Ok(outcome.into_action())
}

/// Requeue with a fixed delay on reconciler errors; the next invocation
/// retries the whole phase sequence.
pub fn error_policy(storage: Arc<Storage>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        storage = %storage.name_any(),
        error = %error,
        "Storage reconciliation failed"
    );
    Action::requeue(Duration::from_secs(30))
}

async fn sync(storage: &Storage, ctx: &Context) -> Result<PhaseOutcome> {
    let cluster = StorageClusterBuilder::new(storage);
    let state = storage
        .status
        .as_ref()
        .map(|s| s.state)
        .unwrap_or_default();
    let mut conditions = storage
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    // First reconcile: seed an observable baseline status, best-effort.
    if storage.status.is_none() {
        if let Err(e) =
            set_storage_state(&ctx.client, ctx.events.as_ref(), storage, state, &conditions).await
        {
            warn!(error = %e, "Failed to seed initial status");
        }
    }

    let outcome = wait_for_statefulset_to_scale(storage, &cluster, ctx, state, &conditions).await?;
    if !outcome.is_continue() {
        return Ok(outcome);
    }

    let outcome = handle_resources_sync(storage, &cluster, ctx).await?;
    if !outcome.is_continue() {
        return Ok(outcome);
    }

    let outcome = wait_for_health_check(storage, &cluster, ctx).await?;
    if !outcome.is_continue() {
        return Ok(outcome);
    }

    run_bootstrap_script(storage, &cluster, ctx, state, &mut conditions).await
}

/// Phase 1: wait for the node group to scale to the desired size.
///
/// A missing StatefulSet means nothing to wait on yet; the sync phase will
/// create it. Once the running count matches and the bootstrap marker is
/// set, the cluster transitions to Ready.
async fn wait_for_statefulset_to_scale(
    storage: &Storage,
    cluster: &StorageClusterBuilder,
    ctx: &Context,
    state: ClusterState,
    conditions: &[Condition],
) -> Result<PhaseOutcome> {
    let namespace = cluster.namespace();
    let name = cluster.name();

    let statefulsets: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), &namespace);
    let existing = match statefulsets.get_opt(&name).await {
        Ok(existing) => existing,
        Err(e) => {
            ctx.events
                .publish(
                    &storage.object_ref(&()),
                    EventType::Normal,
                    reasons::SYNCING,
                    "Scaling",
                    Some(format!("Failed to get StatefulSets: {}", e)),
                )
                .await;
            return Err(e.into());
        }
    };
    if existing.is_none() {
        return Ok(PhaseOutcome::Continue);
    }

    let running =
        match count_running_pods(&ctx.client, &namespace, &name, STORAGE_COMPONENT).await {
            Ok(running) => running,
            Err(e) => {
                ctx.events
                    .publish(
                        &storage.object_ref(&()),
                        EventType::Normal,
                        reasons::SYNCING,
                        "Scaling",
                        Some(format!("Failed to list cluster pods: {}", e)),
                    )
                    .await;
                return Err(e);
            }
        };
    let initialized = is_condition_true(conditions, STORAGE_INITIALIZED_CONDITION);

    match scale_decision(running, storage.spec.nodes, state, initialized) {
        ScaleDecision::WaitForScale { running, desired } => {
            ctx.events
                .publish(
                    &storage.object_ref(&()),
                    EventType::Normal,
                    reasons::PROVISIONING,
                    "Scaling",
                    Some(format!(
                        "Waiting for number of running pods to match expected: {} != {}",
                        running, desired
                    )),
                )
                .await;
            set_storage_state(
                &ctx.client,
                ctx.events.as_ref(),
                storage,
                ClusterState::Provisioning,
                conditions,
            )
            .await?;
            Ok(PhaseOutcome::Requeue(SCALE_REQUEUE_DELAY))
        }
        ScaleDecision::MarkReady => {
            set_storage_state(
                &ctx.client,
                ctx.events.as_ref(),
                storage,
                ClusterState::Ready,
                conditions,
            )
            .await?;
            ctx.events
                .publish(
                    &storage.object_ref(&()),
                    EventType::Normal,
                    reasons::RESOURCES_READY,
                    "Scaling",
                    Some("Everything should be in sync".to_string()),
                )
                .await;
            Ok(PhaseOutcome::Continue)
        }
        ScaleDecision::Settled => Ok(PhaseOutcome::Continue),
    }
}

/// Phase 2: sync the full child resource set through the apply engine.
///
/// Any build or apply failure aborts the whole pass; the next invocation
/// retries every child, which is safe because apply is idempotent. A fresh
/// create requeues immediately so the new workload can converge before the
/// later phases run.
async fn handle_resources_sync(
    storage: &Storage,
    cluster: &StorageClusterBuilder,
    ctx: &Context,
) -> Result<PhaseOutcome> {
    ctx.events
        .publish(
            &storage.object_ref(&()),
            EventType::Normal,
            reasons::PROVISIONING,
            "Syncing",
            Some("Resource sync is in progress".to_string()),
        )
        .await;

    let namespace = cluster.namespace();
    let owner = owner_reference(storage);
    let mut created_any = false;

    for builder in cluster.resource_builders() {
        match builder.sync(&ctx.client, &namespace, &owner).await {
            Ok(created) => created_any |= created,
            Err(e) => {
                ctx.events
                    .publish(
                        &storage.object_ref(&()),
                        EventType::Warning,
                        reasons::PROVISIONING_FAILED,
                        "Syncing",
                        Some(format!(
                            "Failed syncing resource {}: {}",
                            builder.name(),
                            e
                        )),
                    )
                    .await;
                return Err(e);
            }
        }
    }

    if created_any {
        return Ok(PhaseOutcome::RequeueNow);
    }

    ctx.events
        .publish(
            &storage.object_ref(&()),
            EventType::Normal,
            reasons::PROVISIONING,
            "Syncing",
            Some("Resource sync complete".to_string()),
        )
        .await;
    Ok(PhaseOutcome::Continue)
}

/// Phase 3: probe the bootstrap health endpoint.
///
/// Any probe failure means "not yet healthy": a timed requeue with no
/// status mutation, never a controller error.
async fn wait_for_health_check(
    storage: &Storage,
    cluster: &StorageClusterBuilder,
    ctx: &Context,
) -> Result<PhaseOutcome> {
    if let Err(e) = ctx
        .health
        .check_bootstrap_health(&cluster.status_endpoint())
        .await
    {
        ctx.events
            .publish(
                &storage.object_ref(&()),
                EventType::Normal,
                reasons::HEALTHCHECK_IN_PROGRESS,
                "Healthcheck",
                Some(format!("Bootstrap healthcheck is not yet green: {}", e)),
            )
            .await;
        return Ok(PhaseOutcome::Requeue(HEALTHCHECK_RETRY_DELAY));
    }

    ctx.events
        .publish(
            &storage.object_ref(&()),
            EventType::Normal,
            reasons::HEALTHCHECK_OK,
            "Healthcheck",
            Some("Bootstrap healthcheck is green".to_string()),
        )
        .await;
    Ok(PhaseOutcome::Continue)
}

/// Phase 4: one-shot bootstrap, gated by the StorageInitialized condition.
///
/// Runs the two administrative commands in order against the cluster's
/// first member. Either failure requeues without marking initialized, so
/// the next invocation retries both commands from scratch. Success sets
/// the condition and requeues immediately so the scale phase can perform
/// the Ready transition on the next pass.
async fn run_bootstrap_script(
    storage: &Storage,
    cluster: &StorageClusterBuilder,
    ctx: &Context,
    state: ClusterState,
    conditions: &mut Vec<Condition>,
) -> Result<PhaseOutcome> {
    if is_condition_true(conditions, STORAGE_INITIALIZED_CONDITION) {
        return Ok(PhaseOutcome::Continue);
    }

    let namespace = cluster.namespace();
    let pod = format!("{}-0", cluster.name());

    for command in [define_box_command(), configure_root_command()] {
        if let Err(e) = ctx
            .executor
            .exec(&namespace, &pod, STORAGE_CONTAINER, &command)
            .await
        {
            ctx.events
                .publish(
                    &storage.object_ref(&()),
                    EventType::Warning,
                    reasons::INITIALIZING_FAILED,
                    "Bootstrap",
                    Some(format!("Bootstrap command failed, will retry: {}", e)),
                )
                .await;
            return Ok(PhaseOutcome::Requeue(BOOTSTRAP_RETRY_DELAY));
        }
    }

    set_condition(
        conditions,
        STORAGE_INITIALIZED_CONDITION,
        condition_status::TRUE,
        "StorageInitialized",
        "Storage initialized successfully",
    );
    set_storage_state(&ctx.client, ctx.events.as_ref(), storage, state, conditions).await?;

    ctx.events
        .publish(
            &storage.object_ref(&()),
            EventType::Normal,
            reasons::INITIALIZED,
            "Bootstrap",
            Some("Storage initialized successfully".to_string()),
        )
        .await;
    Ok(PhaseOutcome::RequeueNow)
}

/// Count the cluster's member pods currently in the Running phase.
pub(crate) async fn count_running_pods(
    client: &kube::Client,
    namespace: &str,
    cluster_name: &str,
    component: &str,
) -> Result<i32> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().labels(&pod_selector(cluster_name, component));
    let list = pods.list(&params).await?;

    Ok(list
        .items
        .iter()
        .filter(|pod| {
            pod.status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .map(|phase| phase == "Running")
                .unwrap_or(false)
        })
        .count() as i32)
}
