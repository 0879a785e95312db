//! Reconciliation loop
//!
//! The ReconciliationLoop is responsible for:
//! - Polling the AddressProvider once per cycle
//! - Comparing the result against the last committed addresses
//! - Pushing changes through the RecordUpdater
//! - Committing each family only after its update succeeded
//! - Reporting progress through the Notifier and the event channel
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ AddressProvider │─── AddressSnapshot ───┐
//! └─────────────────┘                       │
//!                                           ▼
//!                               ┌─────────────────────┐
//!                               │ ReconciliationLoop  │
//!                               │ (ReconciliationState)│
//!                               └─────────────────────┘
//!                                           │
//!         ┌─────────────────────────────────┼──────────────────────────┐
//!         │                                 │                          │
//!         ▼                                 ▼                          ▼
//! ┌───────────────┐               ┌──────────────┐             ┌─────────────┐
//! │ RecordUpdater │               │   Notifier   │             │  LoopEvent  │
//! │ (per family)  │               │ (best effort)│             │  (channel)  │
//! └───────────────┘               └──────────────┘             └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. `Resolving`: `get_ips()`; failure ends the cycle with state untouched
//! 2. `Comparing`: a family changed when present and different from its
//!    committed value (never committed counts as different)
//! 3. `Updating`: the full snapshot goes to the updater
//! 4. `Notifying`: per-family failures, then one "updated" message
//! 5. Sleep for the interval, whatever happened above

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::LoopConfig;
use crate::error::{Error, Result};
use crate::traits::{
    AddressProvider, AddressSnapshot, IpFamily, Notification, Notifier, RecordChange,
    RecordUpdater,
};

/// Events emitted by the ReconciliationLoop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Loop started
    Started {
        interval: Duration,
    },

    /// A new cycle began
    CycleStarted {
        cycle: u64,
    },

    /// Provider returned a snapshot
    IpResolved {
        snapshot: AddressSnapshot,
    },

    /// Provider failed; the cycle ended without touching state
    ResolutionFailed {
        error: String,
    },

    /// Every present family matched the committed state
    Unchanged {
        snapshot: AddressSnapshot,
    },

    /// A changed family was written and committed
    FamilyCommitted {
        family: IpFamily,
        address: String,
        change: RecordChange,
    },

    /// A changed family could not be written; it stays uncommitted
    FamilyFailed {
        family: IpFamily,
        error: String,
    },

    /// A notification could not be delivered
    NotifyFailed {
        error: String,
    },

    /// Loop stopped
    Stopped {
        reason: String,
    },
}

/// Where the loop is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopPhase {
    #[default]
    Idle,
    Resolving,
    Comparing,
    Updating,
    Notifying,
}

/// Result of a single cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No usable snapshot; nothing else happened
    ResolutionFailed {
        error: String,
    },

    /// Nothing changed; no updater or notifier calls were made
    Unchanged {
        snapshot: AddressSnapshot,
    },

    /// At least one family changed and an update was attempted
    Reconciled {
        /// Families written and committed this cycle
        committed: Vec<IpFamily>,
        /// Changed families that failed, with the error text
        failed: Vec<(IpFamily, String)>,
    },
}

/// A committed address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedAddress {
    pub address: String,
    pub committed_at: DateTime<Utc>,
}

/// Last successfully pushed address per family
///
/// Lives in memory only. After a restart every resolved family is treated
/// as changed on the first cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    ipv4: Option<CommittedAddress>,
    ipv6: Option<CommittedAddress>,
}

impl ReconciliationState {
    /// Last committed address for `family`
    pub fn last(&self, family: IpFamily) -> Option<&str> {
        self.committed(family).map(|c| c.address.as_str())
    }

    /// Last commit for `family`, with its timestamp
    pub fn committed(&self, family: IpFamily) -> Option<&CommittedAddress> {
        match family {
            IpFamily::V4 => self.ipv4.as_ref(),
            IpFamily::V6 => self.ipv6.as_ref(),
        }
    }

    /// True when nothing has been committed yet
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }

    fn is_changed(&self, family: IpFamily, address: &str) -> bool {
        self.last(family) != Some(address)
    }

    fn commit(&mut self, family: IpFamily, address: String) {
        let entry = Some(CommittedAddress {
            address,
            committed_at: Utc::now(),
        });
        match family {
            IpFamily::V4 => self.ipv4 = entry,
            IpFamily::V6 => self.ipv6 = entry,
        }
    }
}

/// Poll → compare → update → notify driver
///
/// ## Lifecycle
///
/// 1. Create with [`ReconciliationLoop::new()`]
/// 2. Drive with [`ReconciliationLoop::run()`] or
///    [`ReconciliationLoop::run_with_shutdown()`], or one cycle at a time
///    with [`ReconciliationLoop::run_cycle()`]
///
/// Cycles never overlap. State is only touched through `&mut self`.
pub struct ReconciliationLoop {
    /// Address source
    provider: Box<dyn AddressProvider>,

    /// DNS record writer
    updater: Box<dyn RecordUpdater>,

    /// Side channel
    notifier: Box<dyn Notifier>,

    /// Sleep after every cycle
    interval: Duration,

    state: ReconciliationState,

    phase: LoopPhase,

    /// Number of cycles started so far
    cycles: u64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<LoopEvent>,
}

impl ReconciliationLoop {
    /// Create a new loop
    ///
    /// # Returns
    ///
    /// A tuple of (loop, event_receiver) where event_receiver yields loop events
    pub fn new(
        provider: Box<dyn AddressProvider>,
        updater: Box<dyn RecordUpdater>,
        notifier: Box<dyn Notifier>,
        config: LoopConfig,
    ) -> Result<(Self, mpsc::Receiver<LoopEvent>)> {
        if config.event_channel_capacity == 0 {
            return Err(Error::config("event_channel_capacity must be greater than 0"));
        }
        if config.interval.is_zero() {
            return Err(Error::config("interval must be greater than 0"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            provider,
            updater,
            notifier,
            interval: config.interval,
            state: ReconciliationState::default(),
            phase: LoopPhase::Idle,
            cycles: 0,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Committed state
    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    /// Current phase (always `Idle` between cycles)
    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run forever
    pub async fn run(&mut self) {
        self.run_with_shutdown(None).await
    }

    /// Run until `shutdown_rx` fires (or forever when `None`)
    ///
    /// Shutdown is observed during the post-cycle sleep only; a cycle that
    /// has started always runs to completion. A dropped sender counts as a
    /// shutdown request.
    pub async fn run_with_shutdown(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) {
        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(shutdown);

        info!(
            "Starting reconciliation loop ({} -> {}, interval {:?})",
            self.provider.provider_name(),
            self.updater.updater_name(),
            self.interval
        );
        self.emit_event(LoopEvent::Started {
            interval: self.interval,
        });

        loop {
            self.run_cycle().await;

            debug!("Sleeping for {:?}", self.interval);
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.emit_event(LoopEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        info!("Reconciliation loop stopped after {} cycle(s)", self.cycles);
    }

    /// Run exactly one cycle, without the trailing sleep
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;
        self.emit_event(LoopEvent::CycleStarted { cycle: self.cycles });

        let outcome = self.reconcile().await;
        self.set_phase(LoopPhase::Idle);
        outcome
    }

    async fn reconcile(&mut self) -> CycleOutcome {
        self.set_phase(LoopPhase::Resolving);
        let snapshot = match self.provider.get_ips().await {
            Ok(snapshot) if snapshot.is_empty() => {
                return self.resolution_failed(Error::resolution(format!(
                    "{} returned neither an IPv4 nor an IPv6 address",
                    self.provider.provider_name()
                )));
            }
            Ok(snapshot) => snapshot,
            Err(e) => return self.resolution_failed(e),
        };
        debug!("Resolved {}", snapshot);
        self.emit_event(LoopEvent::IpResolved {
            snapshot: snapshot.clone(),
        });

        self.set_phase(LoopPhase::Comparing);
        let changed: Vec<(IpFamily, String)> = snapshot
            .iter()
            .filter(|(family, address)| self.state.is_changed(*family, address))
            .map(|(family, address)| (family, address.to_string()))
            .collect();

        if changed.is_empty() {
            info!("IP has not changed ({})", snapshot);
            self.emit_event(LoopEvent::Unchanged {
                snapshot: snapshot.clone(),
            });
            return CycleOutcome::Unchanged { snapshot };
        }

        let summary = describe(&changed);
        info!("New IP obtained: {}", summary);
        self.notify(Notification::new(format!("New IP obtained: {}", summary)))
            .await;

        self.set_phase(LoopPhase::Updating);
        let report = self.updater.update(&snapshot).await;

        let mut committed = Vec::new();
        let mut failed = Vec::new();
        for (family, address) in changed {
            match report.get(family) {
                Some(Ok(change)) => {
                    info!(
                        "{} record {} -> {}",
                        family.record_type(),
                        describe_change(change),
                        address
                    );
                    self.emit_event(LoopEvent::FamilyCommitted {
                        family,
                        address: address.clone(),
                        change: change.clone(),
                    });
                    self.state.commit(family, address);
                    committed.push(family);
                }
                Some(Err(e)) => {
                    error!("Failed to update {} record: {}", family.record_type(), e);
                    failed.push((family, e.to_string()));
                }
                None => {
                    error!(
                        "{} returned no result for the {} record",
                        self.updater.updater_name(),
                        family.record_type()
                    );
                    failed.push((family, "updater returned no result".to_string()));
                }
            }
        }

        // Failures on families that did not change only matter for logs
        for (family, e) in report.failures() {
            if !committed.contains(&family) && !failed.iter().any(|(f, _)| *f == family) {
                warn!(
                    "Refresh of unchanged {} record failed: {}",
                    family.record_type(),
                    e
                );
            }
        }

        self.set_phase(LoopPhase::Notifying);
        for (family, error) in &failed {
            self.emit_event(LoopEvent::FamilyFailed {
                family: *family,
                error: error.clone(),
            });
            self.notify(Notification::new(format!(
                "Failed to update {} record: {}",
                family.record_type(),
                error
            )))
            .await;
        }

        if !committed.is_empty() {
            let updated: Vec<(IpFamily, String)> = committed
                .iter()
                .filter_map(|family| {
                    self.state
                        .last(*family)
                        .map(|address| (*family, address.to_string()))
                })
                .collect();
            self.notify(Notification::new(format!(
                "IP updated to: {}",
                describe(&updated)
            )))
            .await;
        }

        CycleOutcome::Reconciled { committed, failed }
    }

    fn resolution_failed(&mut self, e: Error) -> CycleOutcome {
        error!("Failed to get IP: {}", e);
        let error = e.to_string();
        self.emit_event(LoopEvent::ResolutionFailed {
            error: error.clone(),
        });
        CycleOutcome::ResolutionFailed { error }
    }

    /// Send a notification; failures are logged and otherwise ignored
    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!("[{}] {}", self.notifier.notifier_name(), e);
            self.emit_event(LoopEvent::NotifyFailed {
                error: e.to_string(),
            });
        }
    }

    fn set_phase(&mut self, phase: LoopPhase) {
        if self.phase != phase {
            debug!("Phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Emit a loop event
    fn emit_event(&self, event: LoopEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            // Full channel: drop the event rather than stall the loop
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// "IPv4 1.2.3.4, IPv6 2001:db8::1"
fn describe(families: &[(IpFamily, String)]) -> String {
    families
        .iter()
        .map(|(family, address)| format!("{} {}", family, address))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_change(change: &RecordChange) -> String {
    match change {
        RecordChange::Created => "created".to_string(),
        RecordChange::Updated {
            previous: Some(previous),
        } => format!("updated (was {})", previous),
        RecordChange::Updated { previous: None } => "updated".to_string(),
        RecordChange::Unchanged => "already current".to_string(),
    }
}
