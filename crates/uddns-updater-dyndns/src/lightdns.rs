// # LightDNS
//
// `GET https://api.lightdns.io/update?domain=..&key=..&myip=..`, HTTP 200 on success.

use async_trait::async_trait;
use std::net::IpAddr;
use uddns_core::config::UpdaterConfig;
use uddns_core::traits::{IpFamily, RecordChange, RecordUpdater, RecordUpdaterFactory};
use uddns_core::{Error, Result};

use crate::http;

pub const LIGHTDNS_API_BASE: &str = "https://api.lightdns.io";

pub struct LightDnsUpdater {
    domain: String,
    key: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for LightDnsUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightDnsUpdater")
            .field("domain", &self.domain)
            .field("key", &"<REDACTED>")
            .finish()
    }
}

impl LightDnsUpdater {
    pub fn new(domain: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            domain: domain.into(),
            key: key.into(),
            base_url: LIGHTDNS_API_BASE.to_string(),
            client: http::client()?,
        })
    }

    /// Point the updater at a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl RecordUpdater for LightDnsUpdater {
    async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange> {
        let address = address.to_string();
        let reply = http::get_update(
            &self.client,
            "lightdns",
            &self.base_url,
            family,
            &[
                ("domain", self.domain.as_str()),
                ("key", self.key.as_str()),
                ("myip", address.as_str()),
            ],
        )
        .await?;

        if reply.status != reqwest::StatusCode::OK {
            return Err(Error::remote_update(
                family,
                format!("[lightdns] update failed ({}): {}", reply.status, reply.body),
            ));
        }

        tracing::info!("[lightdns] DNS record updated successfully: {} {}", family.record_type(), address);
        Ok(RecordChange::Updated { previous: None })
    }

    fn updater_name(&self) -> &'static str {
        "lightdns"
    }
}

/// Factory for creating LightDNS updaters
pub struct LightDnsFactory;

impl RecordUpdaterFactory for LightDnsFactory {
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn RecordUpdater>> {
        match config {
            UpdaterConfig::LightDns { domain, key } => {
                if domain.is_empty() || key.is_empty() {
                    return Err(Error::config("lightdns: domain and key are required"));
                }
                Ok(Box::new(LightDnsUpdater::new(domain.clone(), key.clone())?))
            }
            _ => Err(Error::config("Invalid config for lightdns updater")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uddns_core::AddressSnapshot;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn both_families_are_sent_separately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/update"))
            .and(query_param("domain", "home.example.com"))
            .and(query_param("myip", "203.0.113.7"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/update"))
            .and(query_param("myip", "2001:db8::1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let updater = LightDnsUpdater::new("home.example.com", "k")
            .unwrap()
            .with_base_url(server.uri());
        let report = updater
            .update(&AddressSnapshot::dual("203.0.113.7", "2001:db8::1"))
            .await;

        assert!(report.succeeded(IpFamily::V4));
        assert!(matches!(
            report.ipv6,
            Some(Err(Error::RemoteUpdate { family: IpFamily::V6, .. }))
        ));
    }

    #[test]
    fn test_factory_requires_key() {
        let config = UpdaterConfig::LightDns {
            domain: "home.example.com".to_string(),
            key: String::new(),
        };
        assert!(LightDnsFactory.create(&config).is_err());
    }
}
