// # Network Interface Provider
//
// Reads the addresses bound to one local interface, for hosts that hold
// the public address directly (PPPoE links, VPS with a routed /64).
//
// ## Selection
//
// - IPv4: first non-loopback address
// - IPv6: first address that is neither loopback nor link-local
//
// ## Platform Support
//
// Uses `getifaddrs(3)` and only works on Unix. Elsewhere the factory
// refuses to build the provider.

use uddns_core::config::ProviderConfig;
use uddns_core::traits::{AddressProvider, AddressProviderFactory};
use uddns_core::{ComponentRegistry, Error, Result};

#[cfg(unix)]
use uddns_core::traits::AddressSnapshot;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Pick the addresses to publish from `(interface, address)` pairs
///
/// Only entries for `interface` are considered; order is preserved.
pub fn select_addresses<I>(interface: &str, entries: I) -> (Option<Ipv4Addr>, Option<Ipv6Addr>)
where
    I: IntoIterator<Item = (String, IpAddr)>,
{
    let mut ipv4 = None;
    let mut ipv6 = None;

    for (name, address) in entries {
        if name != interface {
            continue;
        }
        match address {
            IpAddr::V4(addr) if ipv4.is_none() && !addr.is_loopback() && !addr.is_unspecified() => {
                ipv4 = Some(addr)
            }
            IpAddr::V6(addr) if ipv6.is_none() && is_global_candidate(&addr) => ipv6 = Some(addr),
            _ => {}
        }
    }

    (ipv4, ipv6)
}

fn is_global_candidate(addr: &Ipv6Addr) -> bool {
    let link_local = (addr.segments()[0] & 0xffc0) == 0xfe80;
    !addr.is_loopback() && !addr.is_unspecified() && !link_local
}

/// Address provider reading a local interface (Unix)
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct NetifProvider {
    name: String,
}

#[cfg(unix)]
impl NetifProvider {
    /// Create a provider for `name`
    ///
    /// # Errors
    ///
    /// - `Error::Config`: the interface does not exist
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        nix::net::if_::if_nametoindex(name.as_str())
            .map_err(|e| Error::config(format!("netif: interface {:?} not found: {}", name, e)))?;
        Ok(Self { name })
    }

    pub fn interface(&self) -> &str {
        &self.name
    }

    fn interface_addresses(&self) -> Result<Vec<(String, IpAddr)>> {
        let addrs = nix::ifaddrs::getifaddrs()
            .map_err(|e| Error::provider("netif", format!("getifaddrs failed: {}", e)))?;

        Ok(addrs
            .filter_map(|ifaddr| {
                let storage = ifaddr.address?;
                let address = if let Some(sin) = storage.as_sockaddr_in() {
                    IpAddr::V4(sin.ip())
                } else if let Some(sin6) = storage.as_sockaddr_in6() {
                    IpAddr::V6(sin6.ip())
                } else {
                    return None;
                };
                Some((ifaddr.interface_name, address))
            })
            .collect())
    }
}

#[cfg(unix)]
#[async_trait::async_trait]
impl AddressProvider for NetifProvider {
    async fn get_ips(&self) -> Result<AddressSnapshot> {
        let entries = self
            .interface_addresses()
            .map_err(|e| Error::resolution(e.to_string()))?;
        let (ipv4, ipv6) = select_addresses(&self.name, entries);
        tracing::debug!("[netif] {}: IPv4={:?} IPv6={:?}", self.name, ipv4, ipv6);

        AddressSnapshot::resolved(ipv4.map(|a| a.to_string()), ipv6.map(|a| a.to_string()))
            .map_err(|_| {
                Error::resolution(format!("[netif] no usable address on interface {}", self.name))
            })
    }

    fn provider_name(&self) -> &'static str {
        "netif"
    }
}

/// Factory for creating network interface providers
pub struct NetifFactory;

#[cfg(unix)]
impl AddressProviderFactory for NetifFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
        match config {
            ProviderConfig::Netif { name } => Ok(Box::new(NetifProvider::new(name.clone())?)),
            _ => Err(Error::config("Invalid config for netif provider")),
        }
    }
}

#[cfg(not(unix))]
impl AddressProviderFactory for NetifFactory {
    fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
        Err(Error::config("netif provider is only supported on Unix"))
    }
}

/// Register the network interface provider with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_provider("netif", Box::new(NetifFactory));
}
