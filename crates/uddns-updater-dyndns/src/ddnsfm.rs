// # ddns.fm
//
// `GET https://api.ddns.fm/update?key=..&domain=..&myip=..`, HTTP 200 on success.

use async_trait::async_trait;
use std::net::IpAddr;
use uddns_core::config::UpdaterConfig;
use uddns_core::traits::{IpFamily, RecordChange, RecordUpdater, RecordUpdaterFactory};
use uddns_core::{Error, Result};

use crate::http;

pub const DDNSFM_API_BASE: &str = "https://api.ddns.fm";

pub struct DdnsFmUpdater {
    domain: String,
    key: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DdnsFmUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdnsFmUpdater")
            .field("domain", &self.domain)
            .field("key", &"<REDACTED>")
            .finish()
    }
}

impl DdnsFmUpdater {
    pub fn new(domain: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            domain: domain.into(),
            key: key.into(),
            base_url: DDNSFM_API_BASE.to_string(),
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
impl RecordUpdater for DdnsFmUpdater {
    async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange> {
        let address = address.to_string();
        let reply = http::get_update(
            &self.client,
            "ddnsfm",
            &self.base_url,
            family,
            &[
                ("key", self.key.as_str()),
                ("domain", self.domain.as_str()),
                ("myip", address.as_str()),
            ],
        )
        .await?;

        if reply.status != reqwest::StatusCode::OK {
            return Err(Error::remote_update(
                family,
                format!("[ddnsfm] update failed ({}): {}", reply.status, reply.body),
            ));
        }

        tracing::info!("[ddnsfm] {} record of {} set to {}", family.record_type(), self.domain, address);
        Ok(RecordChange::Updated { previous: None })
    }

    fn updater_name(&self) -> &'static str {
        "ddnsfm"
    }
}

/// Factory for creating ddns.fm updaters
pub struct DdnsFmFactory;

impl RecordUpdaterFactory for DdnsFmFactory {
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn RecordUpdater>> {
        match config {
            UpdaterConfig::DdnsFm { domain, key } => {
                if domain.is_empty() || key.is_empty() {
                    return Err(Error::config("ddnsfm: domain and key are required"));
                }
                Ok(Box::new(DdnsFmUpdater::new(domain.clone(), key.clone())?))
            }
            _ => Err(Error::config("Invalid config for ddnsfm updater")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn transport_error_does_not_leak_key() {
        let updater = DdnsFmUpdater::new("home.example.com", "SUPERSECRETKEY")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        let err = updater
            .update_record(IpFamily::V6, "2001:db8::1".parse().unwrap())
            .await
            .unwrap_err();

        assert!(err.is_update_error());
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
    }

    #[tokio::test]
    async fn sends_key_domain_and_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/update"))
            .and(query_param("key", "k"))
            .and(query_param("domain", "home.example.com"))
            .and(query_param("myip", "2001:db8::1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let updater = DdnsFmUpdater::new("home.example.com", "k")
            .unwrap()
            .with_base_url(server.uri());
        let change = updater
            .update_record(IpFamily::V6, "2001:db8::1".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(change, RecordChange::Updated { previous: None });
    }

    #[tokio::test]
    async fn non_200_is_a_remote_update_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let updater = DdnsFmUpdater::new("home.example.com", "k")
            .unwrap()
            .with_base_url(server.uri());
        let result = updater
            .update_record(IpFamily::V4, "203.0.113.7".parse().unwrap())
            .await;
        match result {
            Err(Error::RemoteUpdate { message, .. }) => assert!(message.contains("bad key")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_factory_rejects_other_configs() {
        let config = UpdaterConfig::DuckDns {
            domain: "x".to_string(),
            token: "y".to_string(),
        };
        assert!(DdnsFmFactory.create(&config).is_err());
    }
}
