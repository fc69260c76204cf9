//! Error types for the Storage and Database controllers

use thiserror::Error;

/// Controller-level failures.
///
/// Transient collaborator failures (remote commands, health probes, tenant
/// creation) are not represented here: phases translate them into timed
/// requeues instead of errors. An `Error` escaping a phase means the
/// resource itself could not be read or written, and the dispatcher's
/// default backoff applies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
