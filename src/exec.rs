//! Remote command execution via pod exec
//!
//! The reconcilers run administrative commands inside cluster members
//! through the Kubernetes exec API. The `PodExecutor` trait keeps the
//! mechanics out of the phase logic so tests can substitute a fake.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams};
use kube::Client;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Errors that can occur while executing a command in a pod
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to attach to exec stream: {0}")]
    AttachFailed(&'static str),

    #[error("Command exited with failure: {0}")]
    CommandFailed(String),
}

/// Output of a completed remote command
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run a command inside a remote compute unit and report the outcome.
#[async_trait]
pub trait PodExecutor: Send + Sync {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<ExecOutput, ExecError>;
}

/// Executor backed by the Kubernetes exec API.
pub struct KubePodExecutor {
    client: Client,
}

impl KubePodExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodExecutor for KubePodExecutor {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<ExecOutput, ExecError> {
        debug!(pod = %pod, namespace = %namespace, ?command, "Executing command in pod");

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        let attach_params = AttachParams {
            container: Some(container.to_string()),
            stdin: false,
            stdout: true,
            stderr: true,
            tty: false,
            ..Default::default()
        };

        let mut attached = pods.exec(pod, command.to_vec(), &attach_params).await?;

        let stdout_stream = attached
            .stdout()
            .ok_or(ExecError::AttachFailed("stdout"))?;
        let stderr_stream = attached
            .stderr()
            .ok_or(ExecError::AttachFailed("stderr"))?;

        let stdout = read_stream(stdout_stream).await?;
        let stderr = read_stream(stderr_stream).await?;

        // The exec protocol reports the exit status out of band.
        let status = attached.take_status();
        if let Err(e) = attached.join().await {
            return Err(ExecError::CommandFailed(format!(
                "exec stream task failed: {}",
                e
            )));
        }

        if let Some(status_fut) = status {
            if let Some(status) = status_fut.await {
                if status.status.as_deref() == Some("Failure") {
                    let detail = if stderr.is_empty() {
                        status.message.unwrap_or_else(|| "unknown failure".to_string())
                    } else {
                        stderr.clone()
                    };
                    return Err(ExecError::CommandFailed(detail));
                }
            }
        }

        Ok(ExecOutput { stdout, stderr })
    }
}

/// Read an exec output stream to completion.
async fn read_stream(
    mut stream: impl tokio::io::AsyncRead + Unpin,
) -> Result<String, ExecError> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).to_string())
}
