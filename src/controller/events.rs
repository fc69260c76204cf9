//! Kubernetes Event recording
//!
//! Provides a trait-based abstraction over `kube::runtime::events::Recorder`
//! so the event sink is passed explicitly into each phase instead of living
//! in ambient state.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate errors. A failed event must never break reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a Kubernetes Event on the given resource.
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as the given controller name.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// No-op implementation for tests.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
///
/// These appear in `kubectl get events` under the REASON column.
pub mod reasons {
    /// Node group is scaling or resources are being synced
    pub const PROVISIONING: &str = "Provisioning";
    /// Fetching or listing owned objects
    pub const SYNCING: &str = "Syncing";
    /// Bootstrap healthcheck not yet green
    pub const HEALTHCHECK_IN_PROGRESS: &str = "HealthcheckInProgress";
    /// Bootstrap healthcheck is green
    pub const HEALTHCHECK_OK: &str = "HealthcheckOK";
    /// Everything converged, resource is Ready
    pub const RESOURCES_READY: &str = "ResourcesReady";
    /// One-shot initialization completed
    pub const INITIALIZED: &str = "Initialized";
    /// Waiting on an external dependency
    pub const PENDING: &str = "Pending";
    /// Building or applying a child resource failed
    pub const PROVISIONING_FAILED: &str = "ProvisioningFailed";
    /// One-shot initialization failed, will retry
    pub const INITIALIZING_FAILED: &str = "InitializingFailed";
    /// Status read-back or write failed
    pub const CONTROLLER_ERROR: &str = "ControllerError";
}
