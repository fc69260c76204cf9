//! Tagged phase results
//!
//! Every convergence phase reports one of three outcomes: proceed to the
//! next phase, stop and re-invoke later, or stop and re-invoke right away.
//! Suspension is always expressed as a returned requeue request, never as
//! an in-process sleep, so the external dispatcher owns all scheduling.

use std::time::Duration;

use kube::runtime::controller::Action;

/// Requeue delay while waiting for the node group to scale
pub const SCALE_REQUEUE_DELAY: Duration = Duration::from_secs(10);

/// Requeue delay while waiting for the referenced Storage cluster
pub const STORAGE_AWAIT_REQUEUE_DELAY: Duration = Duration::from_secs(60);

/// Requeue delay after a failed tenant-creation attempt
pub const TENANT_CREATION_REQUEUE_DELAY: Duration = Duration::from_secs(30);

/// Requeue delay after a failed bootstrap command
pub const BOOTSTRAP_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Requeue delay while the bootstrap healthcheck is not yet green
pub const HEALTHCHECK_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Outcome of a single convergence phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Phase is satisfied, proceed to the next one
    Continue,
    /// Stop the sequence and re-invoke after the given delay
    Requeue(Duration),
    /// Stop the sequence and re-invoke immediately
    RequeueNow,
}

impl PhaseOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, PhaseOutcome::Continue)
    }

    /// Map the outcome onto the dispatcher's action type.
    ///
    /// Reaching the end of the phase sequence maps to `await_change`: the
    /// watch stream re-triggers reconciliation when anything relevant moves.
    pub fn into_action(self) -> Action {
        match self {
            PhaseOutcome::Continue => Action::await_change(),
            PhaseOutcome::Requeue(delay) => Action::requeue(delay),
            PhaseOutcome::RequeueNow => Action::requeue(Duration::ZERO),
        }
    }
}
