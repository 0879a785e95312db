// # Alibaba Cloud DNS Record Updater
//
// Keeps the A/AAAA records of one name in an AliDNS domain pointed at the
// current addresses.
//
// ## Behaviour
//
// - One lookup, then at most one write, per family per call
// - Record already holds the address: no write, `Unchanged`
// - Record holds something else: `UpdateDomainRecord` on its `RecordId`
// - No record: `AddDomainRecord` under the registrable domain
//
// ## API Reference
//
// Every call is a signed `GET /?Action=...` against
// `https://alidns.{region}.aliyuncs.com`, API version `2015-01-09`.
//
// - `DescribeSubDomainRecords`: `SubDomain`, `Type`
// - `UpdateDomainRecord`: `RecordId`, `RR`, `Type`, `Value`
// - `AddDomainRecord`: `DomainName`, `RR`, `Type`, `Value`

mod signature;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use uddns_core::config::UpdaterConfig;
use uddns_core::traits::{IpFamily, RecordChange, RecordUpdater, RecordUpdaterFactory};
use uddns_core::{ComponentRegistry, Error, Result};

/// AliDNS API version
pub const ALIDNS_API_VERSION: &str = "2015-01-09";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "cn-hangzhou";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Which step of an update a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Lookup,
    Write,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubDomainRecords {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    domain_records: RecordList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordList {
    #[serde(default)]
    record: Vec<DomainRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainRecord {
    record_id: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WriteReply {
    record_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// AliDNS record updater
pub struct AliyunUpdater {
    /// Fully qualified record name
    domain: String,

    /// Registrable domain the record lives under ("example.com")
    domain_name: String,

    /// Host part relative to `domain_name` ("home", or "@" for the apex)
    rr: String,

    access_key_id: String,

    /// Redacted in `Debug`
    access_key_secret: String,

    region_id: String,

    /// API endpoint, overridable for tests
    endpoint: String,

    client: reqwest::Client,
}

impl std::fmt::Debug for AliyunUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunUpdater")
            .field("domain", &self.domain)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("region_id", &self.region_id)
            .finish()
    }
}

impl AliyunUpdater {
    /// Create a new AliDNS updater
    ///
    /// # Parameters
    ///
    /// - `domain`: Record name to manage (e.g., "home.example.com")
    /// - `access_key_id`, `access_key_secret`: RAM credentials with AliDNS access
    /// - `region_id`: API region, [`DEFAULT_REGION`] when `None` or empty
    pub fn new(
        domain: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        region_id: Option<String>,
    ) -> Result<Self> {
        let domain = domain.into().trim_end_matches('.').to_string();
        let access_key_id = access_key_id.into();
        let access_key_secret = access_key_secret.into();
        if access_key_id.is_empty() || access_key_secret.is_empty() {
            return Err(Error::config("aliyun: access_key_id and access_key_secret are required"));
        }

        let (rr, domain_name) = split_domain(&domain)
            .ok_or_else(|| Error::config(format!("aliyun: invalid domain name: {:?}", domain)))?;
        let (rr, domain_name) = (rr.to_string(), domain_name.to_string());

        let region_id = match region_id.filter(|r| !r.is_empty()) {
            Some(region) => region,
            None => {
                tracing::debug!("[aliyun] region_id not set, using {}", DEFAULT_REGION);
                DEFAULT_REGION.to_string()
            }
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("https://alidns.{}.aliyuncs.com", region_id),
            domain,
            domain_name,
            rr,
            access_key_id,
            access_key_secret,
            region_id,
            client,
        })
    }

    /// Point the updater at a different endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    /// Signed parameters for one call
    fn signed_params(&self, action: &str, extra: &[(&str, &str)]) -> Result<BTreeMap<String, String>> {
        let mut params: BTreeMap<String, String> = [
            ("Action", action),
            ("Format", "JSON"),
            ("Version", ALIDNS_API_VERSION),
            ("AccessKeyId", self.access_key_id.as_str()),
            ("SignatureMethod", "HMAC-SHA1"),
            ("SignatureVersion", "1.0"),
        ]
        .iter()
        .chain(extra.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        params.insert(
            "Timestamp".to_string(),
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        params.insert("SignatureNonce".to_string(), uuid::Uuid::new_v4().to_string());

        let string_to_sign = signature::string_to_sign("GET", &params);
        let signature = signature::sign(&string_to_sign, &self.access_key_secret)?;
        params.insert("Signature".to_string(), signature);
        Ok(params)
    }

    /// Call `action` and decode its JSON reply
    async fn call<T: DeserializeOwned>(
        &self,
        family: IpFamily,
        stage: Stage,
        action: &str,
        extra: &[(&str, &str)],
    ) -> Result<T> {
        let fail = |message: String| match stage {
            Stage::Lookup => Error::lookup(family, message),
            Stage::Write => Error::remote_update(family, message),
        };

        let params = self.signed_params(action, extra)?;

        // The URL carries the key id and signature
        let response = self
            .client
            .get(format!("{}/", self.endpoint))
            .query(&params)
            .send()
            .await
            .map_err(|e| fail(format!("{} request failed: {}", action, e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let error: ApiError = response.json().await.unwrap_or_default();
            return Err(fail(status_message(action, status, &error)));
        }

        response
            .json()
            .await
            .map_err(|e| fail(format!("Failed to parse {} response: {}", action, e.without_url())))
    }

    async fn find_record(&self, family: IpFamily) -> Result<Option<DomainRecord>> {
        let records: SubDomainRecords = self
            .call(
                family,
                Stage::Lookup,
                "DescribeSubDomainRecords",
                &[("SubDomain", self.domain.as_str()), ("Type", family.record_type())],
            )
            .await?;

        if records.total_count == 0 {
            return Ok(None);
        }
        Ok(records.domain_records.record.into_iter().next())
    }
}

/// Split a record name into (RR, registrable domain)
///
/// "home.example.com" -> ("home", "example.com"); the apex maps to "@".
fn split_domain(domain: &str) -> Option<(&str, &str)> {
    let mut dots = domain.rmatch_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((second, _))) => Some((&domain[..second], &domain[second + 1..])),
        (Some(_), None) => Some(("@", domain)),
        _ => None,
    }
}

/// Map HTTP status and AliDNS error codes to readable errors
fn status_message(action: &str, status: reqwest::StatusCode, error: &ApiError) -> String {
    let detail = if error.code.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", error.code, error.message)
    };
    match status.as_u16() {
        401 | 403 => format!("{} authentication failed ({})", action, detail),
        404 => format!("{} not found ({})", action, detail),
        429 => format!("{} throttled, retry later ({})", action, detail),
        500..=599 => format!("AliDNS server error (transient) on {}: {}", action, detail),
        _ => format!("{} rejected: {}", action, detail),
    }
}

fn same_address(value: &str, address: IpAddr) -> bool {
    value
        .parse::<IpAddr>()
        .map_or(value == address.to_string(), |current| current == address)
}

#[async_trait]
impl RecordUpdater for AliyunUpdater {
    async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange> {
        let record_type = family.record_type();
        let value = address.to_string();
        tracing::debug!("Reconciling AliDNS {} record {} -> {}", record_type, self.domain, value);

        match self.find_record(family).await? {
            Some(record) if same_address(&record.value, address) => {
                tracing::debug!(
                    "[aliyun] DNS record is already up to date: {} {} -> {}",
                    record_type,
                    self.domain,
                    value
                );
                Ok(RecordChange::Unchanged)
            }
            Some(record) => {
                let _: WriteReply = self
                    .call(
                        family,
                        Stage::Write,
                        "UpdateDomainRecord",
                        &[
                            ("RecordId", record.record_id.as_str()),
                            ("RR", self.rr.as_str()),
                            ("Type", record_type),
                            ("Value", value.as_str()),
                        ],
                    )
                    .await?;
                tracing::info!(
                    "[aliyun] DNS record updated: {} {} -> {} (was: {}, id {})",
                    record_type,
                    self.domain,
                    value,
                    record.value,
                    record.record_id
                );
                Ok(RecordChange::Updated {
                    previous: Some(record.value),
                })
            }
            None => {
                let reply: WriteReply = self
                    .call(
                        family,
                        Stage::Write,
                        "AddDomainRecord",
                        &[
                            ("DomainName", self.domain_name.as_str()),
                            ("RR", self.rr.as_str()),
                            ("Type", record_type),
                            ("Value", value.as_str()),
                        ],
                    )
                    .await?;
                tracing::info!(
                    "[aliyun] DNS record added: {} {} -> {} (id {})",
                    record_type,
                    self.domain,
                    value,
                    reply.record_id
                );
                Ok(RecordChange::Created)
            }
        }
    }

    fn updater_name(&self) -> &'static str {
        "aliyun"
    }
}

/// Factory for creating AliDNS updaters
pub struct AliyunFactory;

impl RecordUpdaterFactory for AliyunFactory {
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn RecordUpdater>> {
        match config {
            UpdaterConfig::Aliyun {
                domain,
                access_key_id,
                access_key_secret,
                region_id,
            } => Ok(Box::new(AliyunUpdater::new(
                domain.clone(),
                access_key_id.clone(),
                access_key_secret.clone(),
                region_id.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for aliyun updater")),
        }
    }
}

/// Register the AliDNS updater with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_updater("aliyun", Box::new(AliyunFactory));
}
