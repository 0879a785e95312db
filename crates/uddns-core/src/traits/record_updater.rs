// # Record Updater Trait
//
// Defines the interface for pushing addresses to a DNS hosting provider.
//
// ## Implementations
//
// - Cloudflare: `uddns-updater-cloudflare` crate
// - DuckDNS, ddns.fm, LightDNS: `uddns-updater-dyndns` crate
//
// ## Failure Policy
//
// Families are updated independently and reported independently. A broken
// IPv6 path never blocks IPv4 from being written and committed, and the
// reverse. Both family updates run concurrently and are joined before
// `update()` returns.

use async_trait::async_trait;
use std::net::IpAddr;

use super::address_provider::{AddressSnapshot, IpFamily};
use crate::error::Result;

/// Outcome of a successful single-family update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// Record did not exist and was created
    Created,
    /// Record existed with a different value and was overwritten
    Updated {
        /// The previous value, when the backend can read it
        previous: Option<String>,
    },
    /// Record already held the target value (no-op)
    Unchanged,
}

/// Per-family result of one `update()` call
///
/// `None` means the family was absent from the snapshot and nothing was
/// attempted for it.
#[derive(Debug, Default)]
pub struct UpdateReport {
    pub ipv4: Option<Result<RecordChange>>,
    pub ipv6: Option<Result<RecordChange>>,
}

impl UpdateReport {
    /// Result for the given family
    pub fn get(&self, family: IpFamily) -> Option<&Result<RecordChange>> {
        match family {
            IpFamily::V4 => self.ipv4.as_ref(),
            IpFamily::V6 => self.ipv6.as_ref(),
        }
    }

    /// True when the family was attempted and succeeded
    pub fn succeeded(&self, family: IpFamily) -> bool {
        matches!(self.get(family), Some(Ok(_)))
    }

    /// True when every attempted family succeeded
    pub fn is_success(&self) -> bool {
        IpFamily::ALL
            .into_iter()
            .all(|family| !matches!(self.get(family), Some(Err(_))))
    }

    /// Failed families with their errors, v4 first
    pub fn failures(&self) -> impl Iterator<Item = (IpFamily, &crate::Error)> {
        IpFamily::ALL.into_iter().filter_map(|family| match self.get(family) {
            Some(Err(e)) => Some((family, e)),
            _ => None,
        })
    }
}

/// Trait for record updater implementations
///
/// Backends implement [`RecordUpdater::update_record`] for one already
/// validated address; the provided [`RecordUpdater::update`] turns a
/// snapshot into per-family calls.
///
/// # Idempotency
///
/// `update_record` must look up the existing record first. If it already
/// holds `address`, return [`RecordChange::Unchanged`] without writing.
/// Otherwise update the existing record in place, or create one when none
/// exists. Calling it twice with the same address must never create a
/// duplicate record. Set-only services without a read API rely on the
/// remote side being idempotent instead.
///
/// # Errors
///
/// - [`crate::Error::Lookup`]: Could not query the existing record
/// - [`crate::Error::RemoteUpdate`]: The create/update call failed
///
/// Do not retry internally. The next cycle is the retry.
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    /// Reconcile the record of `family` with `address`
    ///
    /// `address` is guaranteed to belong to `family`.
    async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange>;

    /// Get the updater name (for logging/debugging)
    fn updater_name(&self) -> &'static str;

    /// Push a snapshot, one independent update per present family
    ///
    /// Absent families are not touched. Present families are validated
    /// before any remote call; a malformed value yields
    /// [`crate::Error::Validation`] for that family only.
    async fn update(&self, snapshot: &AddressSnapshot) -> UpdateReport {
        let (ipv4, ipv6) = tokio::join!(
            update_family(self, IpFamily::V4, snapshot.ipv4()),
            update_family(self, IpFamily::V6, snapshot.ipv6()),
        );
        UpdateReport { ipv4, ipv6 }
    }
}

async fn update_family<U>(
    updater: &U,
    family: IpFamily,
    raw: Option<&str>,
) -> Option<Result<RecordChange>>
where
    U: RecordUpdater + ?Sized,
{
    let raw = raw?;
    let address = match family.parse(raw) {
        Ok(address) => address,
        Err(e) => {
            tracing::warn!(
                "[{}] Refusing to push {} record: {}",
                updater.updater_name(),
                family.record_type(),
                e
            );
            return Some(Err(e));
        }
    };
    Some(updater.update_record(family, address).await)
}

/// Helper trait for constructing record updaters from configuration
pub trait RecordUpdaterFactory: Send + Sync {
    /// Create a RecordUpdater instance from configuration
    fn create(&self, config: &crate::config::UpdaterConfig) -> Result<Box<dyn RecordUpdater>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Mutex;

    struct Recording {
        calls: Mutex<Vec<(IpFamily, IpAddr)>>,
        fail_v6: bool,
    }

    #[async_trait]
    impl RecordUpdater for Recording {
        async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange> {
            self.calls.lock().unwrap().push((family, address));
            if family == IpFamily::V6 && self.fail_v6 {
                return Err(Error::remote_update(family, "boom"));
            }
            Ok(RecordChange::Created)
        }

        fn updater_name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn absent_family_is_not_touched() {
        let updater = Recording {
            calls: Mutex::new(Vec::new()),
            fail_v6: false,
        };
        let report = updater.update(&AddressSnapshot::v4("1.2.3.4")).await;

        assert!(report.ipv6.is_none());
        assert!(report.succeeded(IpFamily::V4));
        assert_eq!(updater.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_address_fails_without_remote_call() {
        let updater = Recording {
            calls: Mutex::new(Vec::new()),
            fail_v6: false,
        };
        let report = updater
            .update(&AddressSnapshot::dual("not-an-ip", "2001:db8::1"))
            .await;

        assert!(matches!(
            report.ipv4,
            Some(Err(Error::Validation { family: IpFamily::V4, .. }))
        ));
        assert!(report.succeeded(IpFamily::V6));
        let calls = updater.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, IpFamily::V6);
    }

    #[tokio::test]
    async fn one_family_failing_does_not_stop_the_other() {
        let updater = Recording {
            calls: Mutex::new(Vec::new()),
            fail_v6: true,
        };
        let report = updater
            .update(&AddressSnapshot::dual("1.2.3.4", "2001:db8::1"))
            .await;

        assert!(report.succeeded(IpFamily::V4));
        assert!(!report.succeeded(IpFamily::V6));
        assert!(!report.is_success());
        let failures: Vec<_> = report.failures().map(|(f, _)| f).collect();
        assert_eq!(failures, vec![IpFamily::V6]);
    }
}
