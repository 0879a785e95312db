// # RouterOS Provider
//
// Reads the WAN address from a MikroTik router through the RouterOS v7
// REST API, for setups where the router dials PPPoE and the host running
// uddns sits behind NAT.
//
// ## Lookup
//
// 1. `GET /rest/interface`: the first interface of type `pppoe-out` is the WAN
// 2. `GET /rest/ip/address`: the address on that interface, prefix length removed
// 3. `GET /rest/ipv6/address`: the first non-link-local address on it
//
// Step 3 failing only loses IPv6.

use uddns_core::config::ProviderConfig;
use uddns_core::traits::{AddressProvider, AddressProviderFactory, AddressSnapshot};
use uddns_core::{ComponentRegistry, Error, Result};

use serde::Deserialize;
use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;
use tracing::{debug, warn};

/// Interface type RouterOS uses for PPPoE client links
const PPPOE_OUT: &str = "pppoe-out";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RosInterface {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RosAddress {
    address: String,
    interface: String,
    /// RouterOS encodes booleans as "true"/"false"
    #[serde(default)]
    disabled: Option<String>,
}

impl RosAddress {
    fn is_active_on(&self, interface: &str) -> bool {
        self.interface == interface && self.disabled.as_deref() != Some("true")
    }

    /// "100.64.1.2/32" -> "100.64.1.2"
    fn host(&self) -> &str {
        self.address
            .split_once('/')
            .map_or(self.address.as_str(), |(host, _)| host)
    }
}

/// Address provider backed by a RouterOS router
pub struct RouterOsProvider {
    /// `{endpoint}/rest`
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl fmt::Debug for RouterOsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOsProvider")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RouterOsProvider {
    /// Create a new RouterOS provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Router base URL (e.g., "https://192.168.88.1")
    /// - `insecure`: Skip TLS certificate verification; defaults to `true`
    ///   since routers ship self-signed certificates
    pub fn new(
        endpoint: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        insecure: Option<bool>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(insecure.unwrap_or(true))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: format!("{}/rest", endpoint.trim_end_matches('/')),
            username: username.into(),
            password: password.into(),
            client,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[routeros] GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::provider("routeros", format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = match status.as_u16() {
                401 | 403 => "Authentication failed".to_string(),
                404 => format!("{} not available", path),
                _ => format!("HTTP error: {}", status),
            };
            return Err(Error::provider("routeros", message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::provider("routeros", format!("Invalid response for {}: {}", path, e)))
    }

    async fn wan_interface(&self) -> Result<String> {
        let interfaces: Vec<RosInterface> = self.get("/interface").await?;
        interfaces
            .into_iter()
            .find(|i| i.kind == PPPOE_OUT)
            .map(|i| i.name)
            .ok_or_else(|| Error::provider("routeros", "no pppoe-out interface found"))
    }

    async fn ipv4_on(&self, interface: &str) -> Result<Option<String>> {
        let addresses: Vec<RosAddress> = self.get("/ip/address").await?;
        Ok(addresses
            .iter()
            .find(|a| a.is_active_on(interface))
            .map(|a| a.host().to_string()))
    }

    async fn ipv6_on(&self, interface: &str) -> Result<Option<String>> {
        let addresses: Vec<RosAddress> = self.get("/ipv6/address").await?;
        Ok(addresses
            .iter()
            .filter(|a| a.is_active_on(interface))
            .map(RosAddress::host)
            .find(|host| match host.parse::<Ipv6Addr>() {
                Ok(addr) => (addr.segments()[0] & 0xffc0) != 0xfe80,
                Err(_) => false,
            })
            .map(str::to_string))
    }
}

#[async_trait::async_trait]
impl AddressProvider for RouterOsProvider {
    async fn get_ips(&self) -> Result<AddressSnapshot> {
        let wan = self
            .wan_interface()
            .await
            .map_err(|e| Error::resolution(e.to_string()))?;

        let (ipv4, ipv6) = tokio::join!(self.ipv4_on(&wan), self.ipv6_on(&wan));
        let ipv4 = ipv4.unwrap_or_else(|e| {
            warn!("[routeros] IPv4 lookup on {} failed: {}", wan, e);
            None
        });
        let ipv6 = ipv6.unwrap_or_else(|e| {
            debug!("[routeros] IPv6 lookup on {} failed: {}", wan, e);
            None
        });

        AddressSnapshot::resolved(ipv4, ipv6).map_err(|_| {
            Error::resolution(format!("[routeros] no address found on {}", wan))
        })
    }

    fn provider_name(&self) -> &'static str {
        "routeros"
    }
}

/// Factory for creating RouterOS providers
pub struct RouterOsFactory;

impl AddressProviderFactory for RouterOsFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn AddressProvider>> {
        match config {
            ProviderConfig::RouterOs {
                endpoint,
                username,
                password,
                insecure,
            } => Ok(Box::new(RouterOsProvider::new(
                endpoint,
                username.clone(),
                password.clone(),
                *insecure,
            )?)),
            _ => Err(Error::config("Invalid config for routeros provider")),
        }
    }
}

/// Register the RouterOS provider with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_provider("routeros", Box::new(RouterOsFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .and(basic_auth("admin", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_interfaces(server: &MockServer) {
        mount_json(
            server,
            "/rest/interface",
            json!([
                {".id": "*1", "name": "ether1", "type": "ether"},
                {".id": "*2", "name": "pppoe-wan", "type": "pppoe-out"},
                {".id": "*3", "name": "pppoe-backup", "type": "pppoe-out"},
            ]),
        )
        .await;
    }

    fn provider(server: &MockServer) -> RouterOsProvider {
        RouterOsProvider::new(&server.uri(), "admin", "secret", None).unwrap()
    }

    #[tokio::test]
    async fn reads_wan_addresses() {
        let server = MockServer::start().await;
        mount_interfaces(&server).await;
        mount_json(
            &server,
            "/rest/ip/address",
            json!([
                {".id": "*1", "address": "192.168.88.1/24", "interface": "bridge", "disabled": "false"},
                {".id": "*2", "address": "100.64.12.34/32", "interface": "pppoe-wan", "disabled": "false"},
            ]),
        )
        .await;
        mount_json(
            &server,
            "/rest/ipv6/address",
            json!([
                {".id": "*1", "address": "fe80::1/64", "interface": "pppoe-wan", "disabled": "false"},
                {".id": "*2", "address": "2001:db8:1::1/64", "interface": "pppoe-wan", "disabled": "false"},
            ]),
        )
        .await;

        let snapshot = provider(&server).get_ips().await.unwrap();
        assert_eq!(snapshot.ipv4(), Some("100.64.12.34"));
        assert_eq!(snapshot.ipv6(), Some("2001:db8:1::1"));
    }

    #[tokio::test]
    async fn ipv6_failure_only_loses_ipv6() {
        let server = MockServer::start().await;
        mount_interfaces(&server).await;
        mount_json(
            &server,
            "/rest/ip/address",
            json!([{"address": "100.64.12.34/32", "interface": "pppoe-wan"}]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/rest/ipv6/address"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let snapshot = provider(&server).get_ips().await.unwrap();
        assert_eq!(snapshot.ipv4(), Some("100.64.12.34"));
        assert_eq!(snapshot.ipv6(), None);
    }

    #[tokio::test]
    async fn missing_pppoe_interface_is_a_resolution_error() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/rest/interface",
            json!([{"name": "ether1", "type": "ether"}]),
        )
        .await;

        let result = provider(&server).get_ips().await;
        assert!(matches!(result, Err(Error::Resolution(_))));
    }

    #[tokio::test]
    async fn bad_credentials_are_a_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = provider(&server).get_ips().await;
        match result {
            Err(Error::Resolution(message)) => assert!(message.contains("Authentication failed")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn debug_redacts_password() {
        let provider =
            RouterOsProvider::new("https://192.168.88.1/", "admin", "hunter2", None).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("https://192.168.88.1/rest"));
    }
}
