//! Reconciliation controllers for Storage and Database resources

pub mod conditions;
pub mod context;
pub mod database;
pub mod error;
pub mod events;
pub mod outcome;
pub mod status;
pub mod storage;

pub use conditions::{
    condition_status, is_condition_true, set_condition, STORAGE_INITIALIZED_CONDITION,
    TENANT_INITIALIZED_CONDITION,
};
pub use context::{Context, DatabaseContext};
pub use database::{database_error_policy, reconcile_database};
pub use error::{Error, Result};
pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
pub use outcome::PhaseOutcome;
pub use storage::{error_policy, reconcile, scale_decision, ScaleDecision};
