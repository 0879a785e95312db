//! Core traits for uddns
//!
//! This module defines the abstract interfaces that all backends implement.
//!
//! - [`AddressProvider`]: Resolve the current addresses
//! - [`RecordUpdater`]: Push addresses to A/AAAA records
//! - [`Notifier`]: Best-effort status messages

pub mod address_provider;
pub mod record_updater;
pub mod notifier;

pub use address_provider::{AddressProvider, AddressProviderFactory, AddressSnapshot, IpFamily};
pub use record_updater::{RecordChange, RecordUpdater, RecordUpdaterFactory, UpdateReport};
pub use notifier::{NoopNotifier, Notification, Notifier, NotifierFactory};
