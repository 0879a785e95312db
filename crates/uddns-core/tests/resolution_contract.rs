//! Architectural Contract Test: Resolution Failure
//!
//! This test verifies what happens when no address can be obtained.
//!
//! Constraints verified:
//! - An empty snapshot cannot be built by a provider
//! - A failed resolution ends the cycle with state untouched
//! - No updater or notifier calls are made on that path
//!
//! If this test fails, someone has:
//! - Let an empty snapshot reach the updater
//! - Cleared committed state on a transient failure

mod common;

use common::*;
use std::time::Duration;
use uddns_core::error::Error;
use uddns_core::{AddressSnapshot, CycleOutcome, IpFamily, LoopEvent};

#[test]
fn both_families_empty_is_a_resolution_error() {
    let result = AddressSnapshot::resolved(None, Some(String::new()));
    assert!(matches!(result, Err(Error::Resolution(_))));
}

#[tokio::test]
async fn failed_resolution_skips_update_and_notify() {
    let provider = ScriptedProvider::failing();
    let updater = InMemoryZoneUpdater::new();
    let notifier = RecordingNotifier::new();
    let (mut reconciler, mut events) =
        build_loop(&provider, &updater, &notifier, Duration::from_secs(10));

    let outcome = reconciler.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::ResolutionFailed { .. }));
    assert_eq!(updater.lookup_count(), 0);
    assert_eq!(notifier.count(), 0);
    assert!(reconciler.state().is_empty());

    assert_eq!(events.recv().await, Some(LoopEvent::CycleStarted { cycle: 1 }));
    assert!(matches!(
        events.recv().await,
        Some(LoopEvent::ResolutionFailed { .. })
    ));
}

#[tokio::test]
async fn empty_snapshot_is_treated_as_resolution_failure() {
    let provider = ScriptedProvider::fixed(AddressSnapshot::default());
    let updater = InMemoryZoneUpdater::new();
    let notifier = RecordingNotifier::new();
    let (mut reconciler, _events) =
        build_loop(&provider, &updater, &notifier, Duration::from_secs(10));

    let outcome = reconciler.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::ResolutionFailed { .. }));
    assert_eq!(updater.lookup_count(), 0);
}

#[tokio::test]
async fn transient_failure_keeps_committed_state() {
    let provider = ScriptedProvider::new(vec![
        Ok(AddressSnapshot::v4("10.0.0.1")),
        Err(Error::resolution("echo service timed out")),
        Ok(AddressSnapshot::v4("10.0.0.1")),
    ]);
    let updater = InMemoryZoneUpdater::new();
    let notifier = RecordingNotifier::new();
    let (mut reconciler, _events) =
        build_loop(&provider, &updater, &notifier, Duration::from_secs(10));

    reconciler.run_cycle().await;
    let outcome = reconciler.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::ResolutionFailed { .. }));
    assert_eq!(reconciler.state().last(IpFamily::V4), Some("10.0.0.1"));

    let outcome = reconciler.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Unchanged { .. }));
    assert_eq!(updater.writes().len(), 1);
}
