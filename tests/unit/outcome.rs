//! Phase outcome to dispatcher action mapping

use std::time::Duration;

use kube::runtime::controller::Action;
use stormdb_operator::controller::outcome::{
    PhaseOutcome, BOOTSTRAP_RETRY_DELAY, HEALTHCHECK_RETRY_DELAY, SCALE_REQUEUE_DELAY,
    STORAGE_AWAIT_REQUEUE_DELAY, TENANT_CREATION_REQUEUE_DELAY,
};

#[test]
fn test_continue_awaits_change() {
    assert_eq!(PhaseOutcome::Continue.into_action(), Action::await_change());
}

#[test]
fn test_requeue_maps_to_timed_action() {
    assert_eq!(
        PhaseOutcome::Requeue(Duration::from_secs(10)).into_action(),
        Action::requeue(Duration::from_secs(10))
    );
}

#[test]
fn test_requeue_now_maps_to_zero_delay() {
    assert_eq!(
        PhaseOutcome::RequeueNow.into_action(),
        Action::requeue(Duration::ZERO)
    );
}

#[test]
fn test_fixed_delays() {
    assert_eq!(SCALE_REQUEUE_DELAY, Duration::from_secs(10));
    assert_eq!(STORAGE_AWAIT_REQUEUE_DELAY, Duration::from_secs(60));
    assert_eq!(TENANT_CREATION_REQUEUE_DELAY, Duration::from_secs(30));
    assert_eq!(BOOTSTRAP_RETRY_DELAY, Duration::from_secs(30));
    assert_eq!(HEALTHCHECK_RETRY_DELAY, Duration::from_secs(30));
}

#[test]
fn test_is_continue() {
    assert!(PhaseOutcome::Continue.is_continue());
    assert!(!PhaseOutcome::RequeueNow.is_continue());
    assert!(!PhaseOutcome::Requeue(Duration::from_secs(1)).is_continue());
}
