//! Test doubles and common utilities for architecture contract tests
//!
//! Every double keeps its counters behind `Arc`s so a test can hold a
//! handle after a clone has been boxed and moved into the loop.

#![allow(dead_code)]

use uddns_core::error::{Error, Result};
use uddns_core::traits::{
    AddressProvider, AddressSnapshot, IpFamily, Notification, Notifier, RecordChange,
    RecordUpdater,
};
use uddns_core::{LoopConfig, ReconciliationLoop};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// An AddressProvider that replays a script of results
///
/// Once the script runs out, the last entry repeats forever.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Result<AddressSnapshot>>>>,
    last: Arc<Mutex<Option<AddressSnapshot>>>,
    call_count: Arc<AtomicUsize>,
    call_instants: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<AddressSnapshot>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            last: Arc::new(Mutex::new(None)),
            call_count: Arc::new(AtomicUsize::new(0)),
            call_instants: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider that always returns the same snapshot
    pub fn fixed(snapshot: AddressSnapshot) -> Self {
        Self::new(vec![Ok(snapshot)])
    }

    /// Provider that always fails resolution
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    /// Get the number of times get_ips() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Instants at which get_ips() was called
    pub fn call_instants(&self) -> Vec<Instant> {
        self.call_instants.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AddressProvider for ScriptedProvider {
    async fn get_ips(&self) -> Result<AddressSnapshot> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_instants.lock().unwrap().push(Instant::now());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => {
                *self.last.lock().unwrap() = None;
                Err(e)
            }
            None => match self.last.lock().unwrap().clone() {
                Some(snapshot) => Ok(snapshot),
                None => Err(Error::resolution("scripted provider has nothing to say")),
            },
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// A RecordUpdater backed by an in-memory zone
///
/// Looks the record up before writing, like a real backend, so the
/// idempotency contract can be checked against `writes()`.
#[derive(Clone, Default)]
pub struct InMemoryZoneUpdater {
    records: Arc<Mutex<HashMap<IpFamily, IpAddr>>>,
    failing: Arc<Mutex<HashSet<IpFamily>>>,
    lookups: Arc<AtomicUsize>,
    writes: Arc<Mutex<Vec<(IpFamily, IpAddr)>>>,
}

impl InMemoryZoneUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write for `family` fail with a RemoteUpdate error
    pub fn fail_family(&self, family: IpFamily) {
        self.failing.lock().unwrap().insert(family);
    }

    /// Stop failing `family`
    pub fn heal_family(&self, family: IpFamily) {
        self.failing.lock().unwrap().remove(&family);
    }

    /// Current record value for `family`
    pub fn record(&self, family: IpFamily) -> Option<IpAddr> {
        self.records.lock().unwrap().get(&family).copied()
    }

    /// Number of records in the zone
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Get the number of lookups performed
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Attempted writes, in order (failed ones included)
    pub fn writes(&self) -> Vec<(IpFamily, IpAddr)> {
        self.writes.lock().unwrap().clone()
    }

    /// Attempted writes for one family
    pub fn writes_for(&self, family: IpFamily) -> usize {
        self.writes().iter().filter(|(f, _)| *f == family).count()
    }
}

#[async_trait::async_trait]
impl RecordUpdater for InMemoryZoneUpdater {
    async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let existing = self.record(family);
        if existing == Some(address) {
            return Ok(RecordChange::Unchanged);
        }

        self.writes.lock().unwrap().push((family, address));
        if self.failing.lock().unwrap().contains(&family) {
            return Err(Error::remote_update(family, "zone rejected the write"));
        }

        self.records.lock().unwrap().insert(family, address);
        Ok(match existing {
            Some(previous) => RecordChange::Updated {
                previous: Some(previous.to_string()),
            },
            None => RecordChange::Created,
        })
    }

    fn updater_name(&self) -> &'static str {
        "in-memory"
    }
}

/// A Notifier that records every message
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    always_fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records, then fails every call
    pub fn failing() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            always_fail: true,
        }
    }

    /// Messages received so far
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.messages.lock().unwrap().push(notification.to_text());
        if self.always_fail {
            return Err(Error::notify("channel unavailable"));
        }
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// Build a loop from doubles, keeping handles to all three
pub fn build_loop(
    provider: &ScriptedProvider,
    updater: &InMemoryZoneUpdater,
    notifier: &RecordingNotifier,
    interval: Duration,
) -> (
    ReconciliationLoop,
    tokio::sync::mpsc::Receiver<uddns_core::LoopEvent>,
) {
    ReconciliationLoop::new(
        Box::new(provider.clone()),
        Box::new(updater.clone()),
        Box::new(notifier.clone()),
        LoopConfig::with_interval(interval),
    )
    .expect("loop construction succeeds")
}

pub fn v4(addr: &str) -> IpAddr {
    addr.parse().unwrap()
}
