// # IP-echo Service Provider
//
// Resolves the caller's public addresses by asking "what is my IP" web
// services.
//
// ## Per-family Clients
//
// Two HTTP clients are kept, one bound to `0.0.0.0` and one to `::`.
// A bound client only dials destinations of its own family, so the same
// service URL answers with the IPv4 address on one client and the IPv6
// address on the other.
//
// ## Service Order
//
// Services are tried in configured order, separately per family. The first
// one answering `200` with a non-empty body wins; there is no merging.

use uddns_core::config::ProviderConfig;
use uddns_core::traits::{AddressProvider, AddressProviderFactory, AddressSnapshot, IpFamily};
use uddns_core::{ComponentRegistry, Error, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use tracing::debug;

/// Built-in services, by name
pub const SERVICES: &[(&str, &str)] = &[
    ("ip.fm", "https://ip.fm/myip"),
    ("ip.sb", "http://ip.sb"),
    ("ifconfig.me", "http://ifconfig.me"),
    ("3322.org", "http://members.3322.org/dyndns/getip"),
];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Services answer plain text to curl, HTML to browsers
const USER_AGENT: &str = "curl/8.6.0";

/// Map a configured service entry to a URL
///
/// Entries are either a built-in name or a literal `http(s)://` URL.
pub fn service_url(entry: &str) -> Result<String> {
    let entry = entry.trim();
    if entry.starts_with("http://") || entry.starts_with("https://") {
        return Ok(entry.to_string());
    }
    SERVICES
        .iter()
        .find(|(name, _)| *name == entry)
        .map(|(_, url)| url.to_string())
        .ok_or_else(|| {
            let known: Vec<&str> = SERVICES.iter().map(|(name, _)| *name).collect();
            Error::config(format!(
                "ip_service: unknown service {:?} (known: {})",
                entry,
                known.join(", ")
            ))
        })
}

/// Address provider backed by public IP-echo services
pub struct IpServiceProvider {
    /// Service URLs in preference order
    urls: Vec<String>,

    /// Client that only dials IPv4 destinations
    client4: reqwest::Client,

    /// Client that only dials IPv6 destinations
    client6: reqwest::Client,
}

impl IpServiceProvider {
    /// Create a provider for the given service entries
    ///
    /// # Errors
    ///
    /// - `Error::Config`: empty list or unknown service name
    pub fn new<S: AsRef<str>>(services: &[S]) -> Result<Self> {
        if services.is_empty() {
            return Err(Error::config("ip_service: no services configured"));
        }
        let urls = services
            .iter()
            .map(|s| service_url(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            urls,
            client4: build_client(IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            client6: build_client(IpAddr::V6(Ipv6Addr::UNSPECIFIED))?,
        })
    }

    /// Configured URLs, in order
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn client(&self, family: IpFamily) -> &reqwest::Client {
        match family {
            IpFamily::V4 => &self.client4,
            IpFamily::V6 => &self.client6,
        }
    }

    /// First non-empty answer for `family`, if any service gives one
    async fn resolve(&self, family: IpFamily) -> Option<String> {
        for url in &self.urls {
            debug!("[ip_service] Requesting {} address from {}", family, url);
            match fetch(self.client(family), url).await {
                Ok(address) => {
                    debug!("[ip_service] Got {} address {} from {}", family, address, url);
                    return Some(address);
                }
                Err(e) => debug!("[ip_service] {} lookup via {} failed: {}", family, url, e),
            }
        }
        None
    }
}

fn build_client(local: IpAddr) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .local_address(local)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .no_proxy()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::provider("ip_service", format!("Request failed: {}", e)))?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(Error::provider(
            "ip_service",
            format!("HTTP error: {}", response.status()),
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::provider("ip_service", format!("Failed to read response: {}", e)))?;

    let address = body.trim();
    if address.is_empty() {
        return Err(Error::provider("ip_service", "Empty response body"));
    }
    Ok(address.to_string())
}

#[async_trait::async_trait]
impl AddressProvider for IpServiceProvider {
    async fn get_ips(&self) -> Result<AddressSnapshot> {
        let (ipv4, ipv6) = tokio::join!(self.resolve(IpFamily::V4), self.resolve(IpFamily::V6));
        AddressSnapshot::resolved(ipv4, ipv6).map_err(|_| {
            Error::resolution(format!(
                "[ip_service] no service answered for IPv4 or IPv6 ({} tried)",
                self.urls.len()
            ))
        })
    }

    fn provider_name(&self) -> &'static str {
        "ip_service"
    }
}

/// Factory for creating IP-echo service providers
pub struct IpServiceFactory;

impl AddressProviderFactory for IpServiceFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
        match config {
            ProviderConfig::IpService { services } => {
                Ok(Box::new(IpServiceProvider::new(services)?))
            }
            _ => Err(Error::config("Invalid config for ip_service provider")),
        }
    }
}

/// Register the IP-echo service provider with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_provider("ip_service", Box::new(IpServiceFactory));
}
