//! Condition ledger
//!
//! Conditions persist one-shot completion markers on a resource's status.
//! `set_condition` is idempotent on the `type_` key: the transition time
//! only moves when the status actually changes, so re-running a phase that
//! re-asserts an already-true condition leaves the ledger untouched.

use chrono::Utc;

use crate::crd::Condition;

/// One-shot marker set after the storage bootstrap commands succeed
pub const STORAGE_INITIALIZED_CONDITION: &str = "StorageInitialized";

/// One-shot marker set after the tenant has been created
pub const TENANT_INITIALIZED_CONDITION: &str = "TenantInitialized";

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
    pub const UNKNOWN: &str = "Unknown";
}

/// Check whether the condition of the given type is present and True.
pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == type_ && c.status == condition_status::TRUE)
}

/// Set a condition, updating in place if the type already exists.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    let now = Utc::now().to_rfc3339();

    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        if existing.status != status {
            existing.status = status.to_string();
            existing.last_transition_time = now;
        }
        existing.reason = reason.to_string();
        existing.message = message.to_string();
    } else {
        conditions.push(Condition {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: now,
        });
    }
}
