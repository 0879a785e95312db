// # DuckDNS
//
// `GET https://www.duckdns.org/update?domains=..&token=..&ip=..`; IPv6
// goes in `ipv6=` instead of `ip=`. The body is `OK` or `KO`.

use async_trait::async_trait;
use std::net::IpAddr;
use uddns_core::config::UpdaterConfig;
use uddns_core::traits::{IpFamily, RecordChange, RecordUpdater, RecordUpdaterFactory};
use uddns_core::{Error, Result};

use crate::http;

pub const DUCKDNS_API_BASE: &str = "https://www.duckdns.org";

pub struct DuckDnsUpdater {
    /// Subdomain(s), comma separated
    domain: String,
    token: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DuckDnsUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDnsUpdater")
            .field("domain", &self.domain)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl DuckDnsUpdater {
    pub fn new(domain: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            domain: domain.into(),
            token: token.into(),
            base_url: DUCKDNS_API_BASE.to_string(),
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
impl RecordUpdater for DuckDnsUpdater {
    async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange> {
        let address = address.to_string();
        let ip_param = match family {
            IpFamily::V4 => "ip",
            IpFamily::V6 => "ipv6",
        };

        let reply = http::get_update(
            &self.client,
            "duckdns",
            &self.base_url,
            family,
            &[
                ("domains", self.domain.as_str()),
                ("token", self.token.as_str()),
                (ip_param, address.as_str()),
            ],
        )
        .await?;

        if reply.body != "OK" {
            return Err(Error::remote_update(
                family,
                format!("[duckdns] update rejected ({}): {}", reply.status, reply.body),
            ));
        }

        tracing::info!("[duckdns] {} record of {} set to {}", family.record_type(), self.domain, address);
        Ok(RecordChange::Updated { previous: None })
    }

    fn updater_name(&self) -> &'static str {
        "duckdns"
    }
}

/// Factory for creating DuckDNS updaters
pub struct DuckDnsFactory;

impl RecordUpdaterFactory for DuckDnsFactory {
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn RecordUpdater>> {
        match config {
            UpdaterConfig::DuckDns { domain, token } => {
                if domain.is_empty() || token.is_empty() {
                    return Err(Error::config("duckdns: domain and token are required"));
                }
                Ok(Box::new(DuckDnsUpdater::new(domain.clone(), token.clone())?))
            }
            _ => Err(Error::config("Invalid config for duckdns updater")),
        }
    }
}
