//! Reconciler phase behavior against a mocked API server
//!
//! The kube client is backed by a tower-test mock service, so each test
//! scripts the exact API exchanges a reconcile invocation performs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::{Method, Request, Response};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::client::Body;
use kube::core::ObjectMeta;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::Client;
use serde_json::json;
use tower_test::mock::{self, Handle};

use stormdb_operator::cms::{TenantError, TenantProvisioner};
use stormdb_operator::controller::events::EventPublisher;
use stormdb_operator::controller::{reconcile, reconcile_database, Context, DatabaseContext};
use stormdb_operator::crd::{
    ClusterState, Condition, Database, DatabaseSpec, DatabaseStatus, ImageSpec, Storage,
    StorageRef, StorageSpec, StorageStatus, VolumeSpec,
};
use stormdb_operator::exec::{ExecError, ExecOutput, PodExecutor};
use stormdb_operator::healthcheck::StatusEndpointChecker;

type ApiHandle = Handle<Request<Body>, Response<Body>>;

fn mock_client() -> (Client, ApiHandle) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    (Client::new(service, "prod"), handle)
}

fn json_response(status: u16, body: serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn not_found() -> Response<Body> {
    json_response(
        404,
        json!({
            "kind": "Status", "apiVersion": "v1", "metadata": {},
            "status": "Failure", "message": "not found",
            "reason": "NotFound", "code": 404
        }),
    )
}

/// Captures every published event as (warning, reason, note).
#[derive(Default)]
struct RecordingEvents {
    records: Mutex<Vec<(bool, String, String)>>,
}

impl RecordingEvents {
    fn note_for(&self, reason: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r, _)| r == reason)
            .map(|(_, _, note)| note.clone())
    }

    fn has_warning(&self, reason: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .iter()
            .any(|(warning, r, _)| *warning && r == reason)
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.records.lock().unwrap().push((
            matches!(type_, EventType::Warning),
            reason.to_string(),
            note.unwrap_or_default(),
        ));
    }
}

/// Counts tenant-creation attempts, always succeeding.
#[derive(Default)]
struct CountingTenants {
    calls: Mutex<usize>,
}

#[async_trait]
impl TenantProvisioner for CountingTenants {
    async fn create_tenant(
        &self,
        _storage_name: &str,
        _storage_namespace: &str,
        _tenant_path: &str,
    ) -> Result<(), TenantError> {
        *self.calls.lock().unwrap() += 1;
        Ok(())
    }
}

/// Executor that must never be reached in these tests.
struct UnreachableExecutor;

#[async_trait]
impl PodExecutor for UnreachableExecutor {
    async fn exec(
        &self,
        _namespace: &str,
        _pod: &str,
        _container: &str,
        _command: &[String],
    ) -> Result<ExecOutput, ExecError> {
        Err(ExecError::CommandFailed(
            "executor must not be called".to_string(),
        ))
    }
}

fn storage_with_state(state: ClusterState) -> Storage {
    Storage {
        metadata: ObjectMeta {
            name: Some("st".to_string()),
            namespace: Some("prod".to_string()),
            ..Default::default()
        },
        spec: StorageSpec {
            nodes: 3,
            image: ImageSpec::default(),
            version: None,
            data_store: VolumeSpec {
                size: "10Gi".to_string(),
                storage_class: None,
            },
        },
        status: Some(StorageStatus {
            state,
            conditions: Vec::new(),
        }),
    }
}

fn database_with_status(state: ClusterState, conditions: Vec<Condition>) -> Database {
    Database {
        metadata: ObjectMeta {
            name: Some("db".to_string()),
            namespace: Some("prod".to_string()),
            ..Default::default()
        },
        spec: DatabaseSpec {
            nodes: 1,
            storage_cluster_ref: StorageRef {
                name: "st".to_string(),
                namespace: None,
            },
            image: ImageSpec::default(),
            version: None,
        },
        status: Some(DatabaseStatus { state, conditions }),
    }
}

#[tokio::test]
async fn test_storage_api_failure_is_recorded_as_syncing_event() {
    let (client, mut handle) = mock_client();
    let events = Arc::new(RecordingEvents::default());
    let ctx = Arc::new(Context {
        client,
        events: events.clone(),
        executor: Arc::new(UnreachableExecutor),
        health: Arc::new(StatusEndpointChecker::new()),
    });

    let server = tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("API request expected");
        assert_eq!(request.method(), Method::GET);
        assert_eq!(
            request.uri().path(),
            "/apis/apps/v1/namespaces/prod/statefulsets/st"
        );
        send.send_response(json_response(
            500,
            json!({
                "kind": "Status", "apiVersion": "v1", "metadata": {},
                "status": "Failure", "message": "etcd is down",
                "reason": "InternalError", "code": 500
            }),
        ));
    });

    let result = reconcile(
        Arc::new(storage_with_state(ClusterState::Pending)),
        ctx.clone(),
    )
    .await;

    assert!(result.is_err());
    server.await.unwrap();

    let note = events
        .note_for("Syncing")
        .expect("API failure must surface as a Syncing event");
    assert!(note.contains("Failed to get StatefulSets"));
}

#[tokio::test]
async fn test_database_never_advances_past_unready_storage() {
    let (client, mut handle) = mock_client();
    let events = Arc::new(RecordingEvents::default());
    let tenants = Arc::new(CountingTenants::default());
    let ctx = Arc::new(DatabaseContext {
        client,
        events: events.clone(),
        tenants: tenants.clone(),
    });

    let database = database_with_status(ClusterState::Pending, Vec::new());
    let db_json = serde_json::to_value(&database).unwrap();
    let storage_json = serde_json::to_value(&storage_with_state(ClusterState::Provisioning)).unwrap();

    let server = tokio::spawn(async move {
        // Status seed: re-fetch plus status patch.
        let (request, send) = handle.next_request().await.expect("seed fetch");
        assert_eq!(request.method(), Method::GET);
        assert!(request.uri().path().ends_with("/databases/db"));
        send.send_response(json_response(200, db_json.clone()));

        let (request, send) = handle.next_request().await.expect("seed patch");
        assert_eq!(request.method(), Method::PATCH);
        assert!(request.uri().path().ends_with("/databases/db/status"));
        send.send_response(json_response(200, db_json.clone()));

        // Dependency fetch: the Storage is not Ready.
        let (request, send) = handle.next_request().await.expect("dependency fetch");
        assert_eq!(request.method(), Method::GET);
        assert!(request.uri().path().ends_with("/storages/st"));
        send.send_response(json_response(200, storage_json));

        // The sequence must stop here: no scale, sync or tenant calls.
        assert!(handle.next_request().await.is_none());
    });

    let action = reconcile_database(Arc::new(database), ctx.clone())
        .await
        .unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(60)));

    drop(ctx);
    server.await.unwrap();

    assert!(events.has_warning("Pending"));
    assert_eq!(*tenants.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_database_ready_event_carries_tenant_message() {
    let (client, mut handle) = mock_client();
    let events = Arc::new(RecordingEvents::default());
    let tenants = Arc::new(CountingTenants::default());
    let ctx = Arc::new(DatabaseContext {
        client,
        events: events.clone(),
        tenants: tenants.clone(),
    });

    let database = database_with_status(
        ClusterState::Provisioning,
        vec![Condition {
            type_: "TenantInitialized".to_string(),
            status: "True".to_string(),
            reason: "TenantInitialized".to_string(),
            message: "Tenant created successfully".to_string(),
            last_transition_time: "2024-01-01T00:00:00Z".to_string(),
        }],
    );
    let db_json = serde_json::to_value(&database).unwrap();
    let storage_json = serde_json::to_value(&storage_with_state(ClusterState::Ready)).unwrap();
    let sts_json = json!({
        "apiVersion": "apps/v1", "kind": "StatefulSet",
        "metadata": {"name": "db", "namespace": "prod"}
    });
    let pod_list = json!({
        "kind": "PodList", "apiVersion": "v1", "metadata": {},
        "items": [{
            "apiVersion": "v1", "kind": "Pod",
            "metadata": {"name": "db-0"},
            "status": {"phase": "Running"}
        }]
    });

    let server = tokio::spawn(async move {
        while let Some((request, send)) = handle.next_request().await {
            let path = request.uri().path().to_string();
            let method = request.method().clone();

            let response = if method == Method::GET && path.ends_with("/databases/db") {
                json_response(200, db_json.clone())
            } else if method == Method::PATCH && path.ends_with("/databases/db/status") {
                json_response(200, db_json.clone())
            } else if method == Method::GET && path.ends_with("/storages/st") {
                json_response(200, storage_json.clone())
            } else if method == Method::GET && path.ends_with("/pods") {
                json_response(200, pod_list.clone())
            } else if method == Method::GET && path.ends_with("/statefulsets/db") {
                json_response(200, sts_json.clone())
            } else if method == Method::PUT {
                json_response(200, sts_json.clone())
            } else if method == Method::GET {
                not_found()
            } else if method == Method::POST {
                let body = if path.contains("/services") {
                    json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "x"}})
                } else if path.contains("/configmaps") {
                    json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "x"}})
                } else if path.contains("/servicemonitors") {
                    json!({
                        "apiVersion": "monitoring.coreos.com/v1", "kind": "ServiceMonitor",
                        "metadata": {"name": "x"}, "spec": {"selector": {}}
                    })
                } else {
                    json!({"apiVersion": "apps/v1", "kind": "StatefulSet", "metadata": {"name": "x"}})
                };
                json_response(201, body)
            } else {
                not_found()
            };

            send.send_response(response);
        }
    });

    // One running pod of one desired, TenantInitialized already set: the
    // scale phase performs the Ready transition, then the resource sync
    // creates the missing children and requeues immediately.
    let action = reconcile_database(Arc::new(database), ctx.clone())
        .await
        .unwrap();
    assert_eq!(action, Action::requeue(Duration::ZERO));

    drop(ctx);
    server.await.unwrap();

    assert_eq!(
        events.note_for("ResourcesReady").as_deref(),
        Some("Resources are ready and tenant is initialized")
    );
    assert_eq!(*tenants.calls.lock().unwrap(), 0);
}
