//! Database reconciler
//!
//! Drives a Database through its convergence sequence: status seed,
//! dependency wait on the referenced Storage cluster, scale-wait, resource
//! sync, one-shot tenant creation, ready.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Resource, ResourceExt};
use tracing::{error, info, instrument, warn};

use crate::controller::conditions::{
    condition_status, is_condition_true, set_condition, TENANT_INITIALIZED_CONDITION,
};
use crate::controller::context::DatabaseContext;
use crate::controller::error::{Error, Result};
use crate::controller::events::reasons;
use crate::controller::outcome::{
    PhaseOutcome, SCALE_REQUEUE_DELAY, STORAGE_AWAIT_REQUEUE_DELAY, TENANT_CREATION_REQUEUE_DELAY,
};
use crate::controller::status::set_database_state;
use crate::controller::storage::{count_running_pods, scale_decision, ScaleDecision};
use crate::crd::{ClusterState, Condition, Database, Storage};
use crate::resources::{owner_reference, DatabaseBuilder, DYNAMIC_COMPONENT};

#[instrument(skip(database, ctx), fields(name = %database.name_any(), namespace = database.namespace().unwrap_or_default()))]
pub async fn reconcile_database(
    database: Arc<Database>,
    ctx: Arc<DatabaseContext>,
) -> Result<Action> {
    info!("Reconciling Database");
    let outcome = sync(&database, &ctx).await?;
    Ok(outcome.into_action())
}

pub fn database_error_policy(
    database: Arc<Database>,
    error: &Error,
    _ctx: Arc<DatabaseContext>,
) -> Action {
    error!(
        database = %database.name_any(),
        error = %error,
        "Database reconciliation failed"
    );
    Action::requeue(Duration::from_secs(30))
}

async fn sync(database: &Database, ctx: &DatabaseContext) -> Result<PhaseOutcome> {
    let builder = DatabaseBuilder::new(database);
    let state = database
        .status
        .as_ref()
        .map(|s| s.state)
        .unwrap_or_default();
    let mut conditions = database
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    // Status seed: best-effort baseline write on every invocation so later
    // phases read back a consistent status. A failure here must not stall
    // the sequence.
    if let Err(e) =
        set_database_state(&ctx.client, ctx.events.as_ref(), database, state, &conditions).await
    {
        warn!(error = %e, "Failed to seed status baseline");
    }

    let outcome = wait_for_cluster_resource(database, &builder, ctx).await?;
    if !outcome.is_continue() {
        return Ok(outcome);
    }

    let outcome =
        wait_for_statefulset_to_scale(database, &builder, ctx, state, &conditions).await?;
    if !outcome.is_continue() {
        return Ok(outcome);
    }

    let outcome = handle_resources_sync(database, &builder, ctx).await?;
    if !outcome.is_continue() {
        return Ok(outcome);
    }

    handle_tenant_creation(database, &builder, ctx, &mut conditions).await
}

/// Phase 2: wait for the referenced Storage cluster to be Ready.
///
/// Dependency failures never mutate status: the Database stays at its
/// prior state while polling the Storage resource on a long interval.
async fn wait_for_cluster_resource(
    database: &Database,
    builder: &DatabaseBuilder,
    ctx: &DatabaseContext,
) -> Result<PhaseOutcome> {
    let api: Api<Storage> =
        Api::namespaced(ctx.client.clone(), &builder.storage_namespace());

    let note = match api.get_opt(&builder.storage_name()).await {
        Ok(Some(storage)) => {
            let state = storage
                .status
                .as_ref()
                .map(|s| s.state)
                .unwrap_or_default();
            if state == ClusterState::Ready {
                return Ok(PhaseOutcome::Continue);
            }
            format!(
                "Waiting for Storage {} to become Ready, currently {}",
                builder.storage_name(),
                state
            )
        }
        Ok(None) => format!("Storage {} not found", builder.storage_name()),
        Err(e) => format!(
            "Failed fetching Storage {}: {}",
            builder.storage_name(),
            e
        ),
    };

    ctx.events
        .publish(
            &database.object_ref(&()),
            EventType::Warning,
            reasons::PENDING,
            "DependencyWait",
            Some(note),
        )
        .await;
    Ok(PhaseOutcome::Requeue(STORAGE_AWAIT_REQUEUE_DELAY))
}

/// Phase 3: wait for the dynamic node group to scale.
///
/// Same decision logic as the Storage reconciler, with the Ready
/// transition gated on the TenantInitialized marker.
async fn wait_for_statefulset_to_scale(
    database: &Database,
    builder: &DatabaseBuilder,
    ctx: &DatabaseContext,
    state: ClusterState,
    conditions: &[Condition],
) -> Result<PhaseOutcome> {
    let namespace = builder.namespace();
    let name = builder.name();

    let statefulsets: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), &namespace);
    let existing = match statefulsets.get_opt(&name).await {
        Ok(existing) => existing,
        Err(e) => {
            ctx.events
                .publish(
                    &database.object_ref(&()),
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
        match count_running_pods(&ctx.client, &namespace, &name, DYNAMIC_COMPONENT).await {
            Ok(running) => running,
            Err(e) => {
                ctx.events
                    .publish(
                        &database.object_ref(&()),
                        EventType::Normal,
                        reasons::SYNCING,
                        "Scaling",
                        Some(format!("Failed to list cluster pods: {}", e)),
                    )
                    .await;
                return Err(e);
            }
        };
    let initialized = is_condition_true(conditions, TENANT_INITIALIZED_CONDITION);

    match scale_decision(running, database.spec.nodes, state, initialized) {
        ScaleDecision::WaitForScale { running, desired } => {
            ctx.events
                .publish(
                    &database.object_ref(&()),
                    EventType::Normal,
                    reasons::PROVISIONING,
                    "Scaling",
                    Some(format!(
                        "Waiting for number of running pods to match expected: {} != {}",
                        running, desired
                    )),
                )
                .await;
            set_database_state(
                &ctx.client,
                ctx.events.as_ref(),
                database,
                ClusterState::Provisioning,
                conditions,
            )
            .await?;
            Ok(PhaseOutcome::Requeue(SCALE_REQUEUE_DELAY))
        }
        ScaleDecision::MarkReady => {
            set_database_state(
                &ctx.client,
                ctx.events.as_ref(),
                database,
                ClusterState::Ready,
                conditions,
            )
            .await?;
            ctx.events
                .publish(
                    &database.object_ref(&()),
                    EventType::Normal,
                    reasons::RESOURCES_READY,
                    "Scaling",
                    Some("Resources are ready and tenant is initialized".to_string()),
                )
                .await;
            Ok(PhaseOutcome::Continue)
        }
        ScaleDecision::Settled => Ok(PhaseOutcome::Continue),
    }
}

/// Phase 4: sync the child resource set, same contract as the Storage
/// resource sync phase.
async fn handle_resources_sync(
    database: &Database,
    builder: &DatabaseBuilder,
    ctx: &DatabaseContext,
) -> Result<PhaseOutcome> {
    ctx.events
        .publish(
            &database.object_ref(&()),
            EventType::Normal,
            reasons::PROVISIONING,
            "Syncing",
            Some("Resource sync is in progress".to_string()),
        )
        .await;

    let namespace = builder.namespace();
    let owner = owner_reference(database);
    let mut created_any = false;

    for resource in builder.resource_builders() {
        match resource.sync(&ctx.client, &namespace, &owner).await {
            Ok(created) => created_any |= created,
            Err(e) => {
                ctx.events
                    .publish(
                        &database.object_ref(&()),
                        EventType::Warning,
                        reasons::PROVISIONING_FAILED,
                        "Syncing",
                        Some(format!(
                            "Failed syncing resource {}: {}",
                            resource.name(),
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
            &database.object_ref(&()),
            EventType::Normal,
            reasons::PROVISIONING,
            "Syncing",
            Some("Resource sync complete".to_string()),
        )
        .await;
    Ok(PhaseOutcome::Continue)
}

/// Phase 5: one-shot tenant creation, gated by TenantInitialized.
///
/// The state moves to Initializing before the console call so a failed
/// attempt is observable. Failure requeues with the tenant retry delay;
/// the collaborator call is retried wholesale on the next pass. Success
/// sets the marker exactly once and requeues immediately so the scale
/// phase performs the Ready transition.
async fn handle_tenant_creation(
    database: &Database,
    builder: &DatabaseBuilder,
    ctx: &DatabaseContext,
    conditions: &mut Vec<Condition>,
) -> Result<PhaseOutcome> {
    if is_condition_true(conditions, TENANT_INITIALIZED_CONDITION) {
        return Ok(PhaseOutcome::Continue);
    }

    set_database_state(
        &ctx.client,
        ctx.events.as_ref(),
        database,
        ClusterState::Initializing,
        conditions,
    )
    .await?;

    let tenant = builder.tenant_name();
    if let Err(e) = ctx
        .tenants
        .create_tenant(
            &builder.storage_name(),
            &builder.storage_namespace(),
            &tenant,
        )
        .await
    {
        ctx.events
            .publish(
                &database.object_ref(&()),
                EventType::Warning,
                reasons::INITIALIZING_FAILED,
                "TenantCreation",
                Some(format!("Failed creating tenant {}, will retry: {}", tenant, e)),
            )
            .await;
        return Ok(PhaseOutcome::Requeue(TENANT_CREATION_REQUEUE_DELAY));
    }

    set_condition(
        conditions,
        TENANT_INITIALIZED_CONDITION,
        condition_status::TRUE,
        "TenantInitialized",
        "Tenant created successfully",
    );
    set_database_state(
        &ctx.client,
        ctx.events.as_ref(),
        database,
        ClusterState::Initializing,
        conditions,
    )
    .await?;

    ctx.events
        .publish(
            &database.object_ref(&()),
            EventType::Normal,
            reasons::INITIALIZED,
            "TenantCreation",
            Some(format!("Tenant {} created", tenant)),
        )
        .await;
    Ok(PhaseOutcome::RequeueNow)
}
