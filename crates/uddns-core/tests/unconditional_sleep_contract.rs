//! Architectural Contract Test: Unconditional Sleep
//!
//! This test verifies the pacing of cycles.
//!
//! Constraints verified:
//! - Exactly one interval passes between the starts of consecutive cycles
//! - A cycle that fails at resolution still waits the full interval
//! - There is no fast retry after a failure
//!
//! If this test fails, someone has:
//! - Skipped the sleep on an error path
//! - Added retry/backoff inside the loop

mod common;

use common::*;
use std::time::Duration;
use uddns_core::AddressSnapshot;

const INTERVAL: Duration = Duration::from_secs(10);

#[tokio::test(start_paused = true)]
async fn failed_resolution_still_sleeps_full_interval() {
    let provider = ScriptedProvider::failing();
    let updater = InMemoryZoneUpdater::new();
    let notifier = RecordingNotifier::new();
    let (mut reconciler, _events) = build_loop(&provider, &updater, &notifier, INTERVAL);

    let result = tokio::time::timeout(Duration::from_secs(25), reconciler.run()).await;
    assert!(result.is_err(), "loop never returns on its own");

    let instants = provider.call_instants();
    assert_eq!(instants.len(), 3, "cycles at t=0, t=10 and t=20");
    for pair in instants.windows(2) {
        assert_eq!(pair[1] - pair[0], INTERVAL);
    }
    assert_eq!(updater.lookup_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn successful_cycles_use_the_same_interval() {
    let provider = ScriptedProvider::fixed(AddressSnapshot::v4("10.0.0.1"));
    let updater = InMemoryZoneUpdater::new();
    let notifier = RecordingNotifier::new();
    let (mut reconciler, _events) = build_loop(&provider, &updater, &notifier, INTERVAL);

    let _ = tokio::time::timeout(Duration::from_secs(35), reconciler.run()).await;

    let instants = provider.call_instants();
    assert_eq!(instants.len(), 4);
    for pair in instants.windows(2) {
        assert_eq!(pair[1] - pair[0], INTERVAL);
    }
    assert_eq!(updater.writes().len(), 1, "only the first cycle writes");
    assert_eq!(notifier.count(), 2);
}
