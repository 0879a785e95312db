// # Address Provider Trait
//
// Defines the interface for resolving the current public or
// interface-bound addresses.
//
// ## Implementations
//
// - Public IP-echo services: `uddns-ip-service` crate
// - Local network interface: `uddns-ip-netif` crate
// - MikroTik RouterOS REST API: `uddns-ip-routeros` crate
//
// ## Usage
//
// ```rust,ignore
// use uddns_core::AddressProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* AddressProvider implementation */;
//
//     let snapshot = provider.get_ips().await?;
//     println!("A: {:?} AAAA: {:?}", snapshot.ipv4(), snapshot.ipv6());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// Address family (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Both families, in the order the loop processes them
    pub const ALL: [IpFamily; 2] = [IpFamily::V4, IpFamily::V6];

    /// DNS record type that carries this family
    pub fn record_type(self) -> &'static str {
        match self {
            IpFamily::V4 => "A",
            IpFamily::V6 => "AAAA",
        }
    }

    /// Parse `raw` as an address of this family
    ///
    /// No trimming or normalisation is applied: a provider that hands over
    /// `" 1.2.3.4"` gets a validation error, not a silent fix.
    pub fn parse(self, raw: &str) -> Result<IpAddr> {
        match self {
            IpFamily::V4 => raw
                .parse::<Ipv4Addr>()
                .map(IpAddr::V4)
                .map_err(|_| Error::validation(self, raw)),
            IpFamily::V6 => raw
                .parse::<Ipv6Addr>()
                .map(IpAddr::V6)
                .map_err(|_| Error::validation(self, raw)),
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("IPv4"),
            IpFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// One observation of the caller's addresses
///
/// Either family may be absent. Empty strings are stored as absent, so
/// `ipv4()` never returns `Some("")`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    ipv4: Option<String>,
    ipv6: Option<String>,
}

impl AddressSnapshot {
    /// Create a snapshot, normalising empty strings to absent
    pub fn new(ipv4: Option<String>, ipv6: Option<String>) -> Self {
        Self {
            ipv4: ipv4.filter(|s| !s.is_empty()),
            ipv6: ipv6.filter(|s| !s.is_empty()),
        }
    }

    /// Build the snapshot a provider returns, failing when both families are absent
    ///
    /// This is the only constructor providers should return from `get_ips()`;
    /// it enforces that an empty-empty snapshot is never handed to the loop.
    pub fn resolved(ipv4: Option<String>, ipv6: Option<String>) -> Result<Self> {
        let snapshot = Self::new(ipv4, ipv6);
        if snapshot.is_empty() {
            return Err(Error::resolution(
                "could not determine either an IPv4 or an IPv6 address",
            ));
        }
        Ok(snapshot)
    }

    /// Snapshot with only an IPv4 address
    pub fn v4(addr: impl Into<String>) -> Self {
        Self::new(Some(addr.into()), None)
    }

    /// Snapshot with only an IPv6 address
    pub fn v6(addr: impl Into<String>) -> Self {
        Self::new(None, Some(addr.into()))
    }

    /// Snapshot with both families
    pub fn dual(ipv4: impl Into<String>, ipv6: impl Into<String>) -> Self {
        Self::new(Some(ipv4.into()), Some(ipv6.into()))
    }

    pub fn ipv4(&self) -> Option<&str> {
        self.ipv4.as_deref()
    }

    pub fn ipv6(&self) -> Option<&str> {
        self.ipv6.as_deref()
    }

    /// Address for the given family, if present
    pub fn get(&self, family: IpFamily) -> Option<&str> {
        match family {
            IpFamily::V4 => self.ipv4(),
            IpFamily::V6 => self.ipv6(),
        }
    }

    /// True when neither family is present
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }

    /// Present families with their addresses, v4 first
    pub fn iter(&self) -> impl Iterator<Item = (IpFamily, &str)> {
        IpFamily::ALL
            .into_iter()
            .filter_map(|family| self.get(family).map(|addr| (family, addr)))
    }
}

impl fmt::Display for AddressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv4={} IPv6={}",
            self.ipv4().unwrap_or("-"),
            self.ipv6().unwrap_or("-")
        )
    }
}

/// Trait for address provider implementations
///
/// # Contract
///
/// - Resolve IPv4 and IPv6 independently; one family failing is not fatal.
/// - Fail with [`Error::Resolution`] only when neither family resolved.
/// - When several sources are configured, try them in order and take the
///   first non-empty answer per family. No merging.
/// - Bound latency at the I/O boundary. The loop has no cancellation, so a
///   hanging call stalls the whole cycle.
///
/// Implementations must not keep "last seen" state of their own; change
/// detection belongs to the `ReconciliationLoop`.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// Resolve the current addresses
    ///
    /// # Returns
    ///
    /// - `Ok(AddressSnapshot)`: At least one family resolved
    /// - `Err(Error::Resolution)`: Neither family could be determined
    async fn get_ips(&self) -> Result<AddressSnapshot>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing address providers from configuration
pub trait AddressProviderFactory: Send + Sync {
    /// Create an AddressProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn AddressProvider>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_are_absent() {
        let snapshot = AddressSnapshot::new(Some(String::new()), Some("::1".to_string()));
        assert_eq!(snapshot.ipv4(), None);
        assert_eq!(snapshot.ipv6(), Some("::1"));
    }

    #[test]
    fn resolved_rejects_empty_snapshot() {
        let result = AddressSnapshot::resolved(Some(String::new()), None);
        assert!(matches!(result, Err(Error::Resolution(_))));
    }

    #[test]
    fn family_parse_enforces_family() {
        assert!(IpFamily::V4.parse("1.2.3.4").is_ok());
        assert!(IpFamily::V6.parse("2001:db8::1").is_ok());
        assert!(matches!(
            IpFamily::V4.parse("2001:db8::1"),
            Err(Error::Validation { family: IpFamily::V4, .. })
        ));
        assert!(matches!(
            IpFamily::V6.parse("1.2.3.4"),
            Err(Error::Validation { family: IpFamily::V6, .. })
        ));
        assert!(IpFamily::V4.parse(" 1.2.3.4").is_err());
    }

    #[test]
    fn iter_yields_present_families_in_order() {
        let snapshot = AddressSnapshot::dual("10.0.0.1", "2001:db8::1");
        let families: Vec<_> = snapshot.iter().map(|(f, _)| f).collect();
        assert_eq!(families, vec![IpFamily::V4, IpFamily::V6]);
        assert_eq!(IpFamily::V6.record_type(), "AAAA");
    }
}
