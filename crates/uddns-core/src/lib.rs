// # uddns-core
//
// Core library for the uddns dynamic DNS client.
//
// ## Architecture Overview
//
// - **AddressProvider**: Resolves the current IPv4/IPv6 addresses
// - **RecordUpdater**: Pushes addresses to a DNS hosting provider's A/AAAA records
// - **Notifier**: Best-effort side channel for state change messages
// - **ReconciliationLoop**: Polls, compares, updates, notifies on a fixed interval
// - **ComponentRegistry**: Explicit table of named backend factories
//
// ## Design Principles
//
// 1. **Separation of Concerns**: The loop only sees the three traits, never a backend
// 2. **Per-family Progress**: IPv4 and IPv6 are updated and committed independently
// 3. **Explicit Composition**: Backends are registered by the caller, selected by config tag
// 4. **Library-First**: The daemon is a thin shell around this crate

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{
    AddressProvider, AddressSnapshot, IpFamily, Notification, Notifier, NoopNotifier,
    RecordChange, RecordUpdater, UpdateReport,
};
pub use engine::{
    CommittedAddress, CycleOutcome, LoopEvent, LoopPhase, ReconciliationLoop, ReconciliationState,
};
pub use registry::ComponentRegistry;
pub use config::{LoopConfig, NotifierConfig, ProviderConfig, UddnsConfig, UpdaterConfig};
pub use error::{Error, Result};
