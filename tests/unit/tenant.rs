//! Tenant provisioning through the console executor

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stormdb_operator::cms::{create_tenant_command, ConsoleTenantClient, TenantProvisioner};
use stormdb_operator::exec::{ExecError, ExecOutput, PodExecutor};

/// Records every exec invocation; fails the first `fail_first` calls.
struct RecordingExecutor {
    calls: Mutex<Vec<(String, String, String, Vec<String>)>>,
    fail_first: Mutex<usize>,
}

impl RecordingExecutor {
    fn new(fail_first: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_first: Mutex::new(fail_first),
        }
    }
}

#[async_trait]
impl PodExecutor for RecordingExecutor {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<ExecOutput, ExecError> {
        self.calls.lock().unwrap().push((
            namespace.to_string(),
            pod.to_string(),
            container.to_string(),
            command.to_vec(),
        ));

        let mut remaining = self.fail_first.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ExecError::CommandFailed("simulated failure".to_string()));
        }
        Ok(ExecOutput::default())
    }
}

#[test]
fn test_create_tenant_command_shape() {
    let command = create_tenant_command("/Root/db");
    assert_eq!(command[0], "/opt/stormdb/bin/stormdb");
    assert!(command.contains(&"database".to_string()));
    assert!(command.contains(&"/Root/db".to_string()));
    assert!(command.contains(&"create".to_string()));
    assert_eq!(command.last().map(String::as_str), Some("ssd:1"));
}

#[tokio::test]
async fn test_create_tenant_runs_in_first_storage_member() {
    let executor = Arc::new(RecordingExecutor::new(0));
    let client = ConsoleTenantClient::new(executor.clone());

    client
        .create_tenant("st", "prod", "/Root/db")
        .await
        .unwrap();

    let calls = executor.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (namespace, pod, container, command) = &calls[0];
    assert_eq!(namespace, "prod");
    assert_eq!(pod, "st-0");
    assert_eq!(container, "stormdb-storage");
    assert_eq!(command, &create_tenant_command("/Root/db"));
}

#[tokio::test]
async fn test_create_tenant_surfaces_exec_failure() {
    let executor = Arc::new(RecordingExecutor::new(1));
    let client = ConsoleTenantClient::new(executor.clone());

    let first = client.create_tenant("st", "prod", "/Root/db").await;
    assert!(first.is_err());

    // A retried call goes through once the command succeeds at the target.
    let second = client.create_tenant("st", "prod", "/Root/db").await;
    assert!(second.is_ok());
    assert_eq!(executor.calls.lock().unwrap().len(), 2);
}
