// # Cloudflare Record Updater
//
// Keeps the A/AAAA records of one name in a Cloudflare zone pointed at the
// current addresses.
//
// ## Behaviour
//
// - One lookup, then at most one write, per family per call
// - Record already holds the address: no write, `Unchanged`
// - Record holds something else: `PUT` in place, keeping TTL and proxied flag
// - No record: `POST` a new one (TTL 60 unless configured, not proxied)
// - No retries, no caching; the reconciliation loop owns both
//
// ## Authentication
//
// Either a scoped API token (`Authorization: Bearer`) or the legacy global
// key (`X-Auth-Email` + `X-Auth-Key`). Neither ever reaches a log line.
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::IpAddr;
use std::time::Duration;
use uddns_core::config::UpdaterConfig;
use uddns_core::traits::{IpFamily, RecordChange, RecordUpdater, RecordUpdaterFactory};
use uddns_core::{ComponentRegistry, Error, Result};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL for records this updater creates
pub const DEFAULT_TTL: u32 = 60;

/// How requests are authenticated
#[derive(Clone)]
pub enum Credentials {
    /// Scoped API token with Zone:DNS:Edit
    Token(String),
    /// Account email plus global API key
    GlobalKey { email: String, api_key: String },
}

impl Credentials {
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::GlobalKey { email, api_key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", api_key),
        }
    }
}

// Custom Debug implementation that hides the secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Token(<REDACTED>)"),
            Credentials::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .field("api_key", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Which step of an update a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Lookup,
    Write,
}

/// Cloudflare API v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    content: String,
    #[serde(default = "default_ttl")]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
}

fn default_ttl() -> u32 {
    1
}

/// Cloudflare record updater
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the updater will:
/// - Perform all GET requests (zone lookup, record lookup)
/// - Log the intended PUT/POST payload
/// - **NOT** actually modify DNS records
pub struct CloudflareUpdater {
    /// Fully qualified record name
    domain: String,

    credentials: Credentials,

    /// Zone ID (optional, looked up from the domain when absent)
    zone_id: Option<String>,

    /// TTL for created records
    ttl: u32,

    /// API base, overridable for tests
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

impl std::fmt::Debug for CloudflareUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareUpdater")
            .field("domain", &self.domain)
            .field("credentials", &self.credentials)
            .field("zone_id", &self.zone_id)
            .field("ttl", &self.ttl)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareUpdater {
    /// Create a new Cloudflare updater
    ///
    /// # Parameters
    ///
    /// - `domain`: Record name to manage (e.g., "home.example.com")
    /// - `credentials`: API token or global key
    /// - `zone_id`: Optional zone ID (looked up from `domain` otherwise)
    /// - `ttl`: TTL for newly created records, [`DEFAULT_TTL`] when `None`
    /// - `dry_run`: If true, perform GET requests but skip writes
    pub fn new(
        domain: impl Into<String>,
        credentials: Credentials,
        zone_id: Option<String>,
        ttl: Option<u32>,
        dry_run: bool,
    ) -> Result<Self> {
        let domain = domain.into();
        if domain.is_empty() {
            return Err(Error::config("Cloudflare domain cannot be empty"));
        }
        let has_secret = match &credentials {
            Credentials::Token(token) => !token.is_empty(),
            Credentials::GlobalKey { email, api_key } => !email.is_empty() && !api_key.is_empty(),
        };
        if !has_secret {
            return Err(Error::config("Cloudflare credentials cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            domain,
            credentials,
            zone_id: zone_id.filter(|z| !z.is_empty()),
            ttl: ttl.unwrap_or(DEFAULT_TTL),
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the updater at a different API base
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send a request and unwrap the API envelope
    async fn send<T: DeserializeOwned>(
        &self,
        family: IpFamily,
        stage: Stage,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>> {
        let fail = |message: String| match stage {
            Stage::Lookup => Error::lookup(family, message),
            Stage::Write => Error::remote_update(family, message),
        };

        let response = self
            .credentials
            .apply(request)
            .send()
            .await
            .map_err(|e| fail(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(fail(status_message(status, &error_text)));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| fail(format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            let reasons: Vec<String> = envelope
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect();
            return Err(fail(format!("API error: {}", reasons.join("; "))));
        }

        Ok(envelope.result)
    }

    /// Configured zone ID, or the one Cloudflare has for the registrable domain
    async fn resolve_zone_id(&self, family: IpFamily) -> Result<String> {
        if let Some(zone_id) = &self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(zone_id.clone());
        }

        let zone_name = zone_name(&self.domain)
            .ok_or_else(|| Error::lookup(family, format!("Invalid domain name: {}", self.domain)))?;
        tracing::debug!("Looking up zone ID for domain: {}", zone_name);

        let request = self
            .client
            .get(format!("{}/zones", self.api_base))
            .query(&[("name", zone_name)]);

        let zones: Vec<Zone> = self
            .send(family, Stage::Lookup, request)
            .await?
            .unwrap_or_default();

        zones
            .into_iter()
            .next()
            .map(|zone| zone.id)
            .ok_or_else(|| Error::lookup(family, format!("Zone not found: {}", zone_name)))
    }

    async fn find_record(&self, family: IpFamily, zone_id: &str) -> Result<Option<DnsRecord>> {
        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .query(&[("name", self.domain.as_str()), ("type", family.record_type())]);

        let records: Vec<DnsRecord> = self
            .send(family, Stage::Lookup, request)
            .await?
            .unwrap_or_default();

        Ok(records.into_iter().next())
    }
}

/// Last two labels of a record name: "home.example.com" -> "example.com"
///
/// Multi-part public suffixes (".co.uk") need `zone_id` configured.
fn zone_name(domain: &str) -> Option<&str> {
    let domain = domain.trim_end_matches('.');
    let mut dots = domain.rmatch_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((second, _))) => Some(&domain[second + 1..]),
        (Some(_), None) => Some(domain),
        _ => None,
    }
}

/// Map HTTP status codes to readable errors
fn status_message(status: reqwest::StatusCode, error_text: &str) -> String {
    match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid credentials or insufficient permissions. Status: {}",
            status
        ),
        404 => format!("Not found: {} - {}", status, error_text),
        409 => format!(
            "Conflict: Record is being updated by another process. Status: {}",
            status
        ),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!(
            "Cloudflare server error (transient): {} - {}",
            status, error_text
        ),
        _ => format!("Request failed: {} - {}", status, error_text),
    }
}

fn same_address(content: &str, address: IpAddr) -> bool {
    content
        .parse::<IpAddr>()
        .map_or(content == address.to_string(), |current| current == address)
}

#[async_trait]
impl RecordUpdater for CloudflareUpdater {
    async fn update_record(&self, family: IpFamily, address: IpAddr) -> Result<RecordChange> {
        let record_type = family.record_type();
        tracing::debug!(
            "Reconciling Cloudflare {} record {} -> {} [mode: {}]",
            record_type,
            self.domain,
            address,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let zone_id = self.resolve_zone_id(family).await?;
        let existing = self.find_record(family, &zone_id).await?;

        match existing {
            Some(record) if same_address(&record.content, address) => {
                tracing::info!(
                    "DNS record already has correct IP: {} {} -> {}",
                    record_type,
                    self.domain,
                    address
                );
                Ok(RecordChange::Unchanged)
            }
            Some(record) => {
                let url = format!(
                    "{}/zones/{}/dns_records/{}",
                    self.api_base, zone_id, record.id
                );
                let payload = serde_json::json!({
                    "type": record_type,
                    "name": self.domain,
                    "content": address.to_string(),
                    "ttl": record.ttl,
                    "proxied": record.proxied,
                });

                if self.dry_run {
                    tracing::info!("[DRY-RUN] Would send PUT request to {} with payload: {}", url, payload);
                } else {
                    let request = self.client.put(&url).json(&payload);
                    self.send::<serde_json::Value>(family, Stage::Write, request)
                        .await?;
                    tracing::info!(
                        "DNS record updated: {} {} -> {} (was: {})",
                        record_type,
                        self.domain,
                        address,
                        record.content
                    );
                }

                Ok(RecordChange::Updated {
                    previous: Some(record.content),
                })
            }
            None => {
                let url = format!("{}/zones/{}/dns_records", self.api_base, zone_id);
                let payload = serde_json::json!({
                    "type": record_type,
                    "name": self.domain,
                    "content": address.to_string(),
                    "ttl": self.ttl,
                    "proxied": false,
                });

                if self.dry_run {
                    tracing::info!("[DRY-RUN] Would send POST request to {} with payload: {}", url, payload);
                } else {
                    let request = self.client.post(&url).json(&payload);
                    self.send::<serde_json::Value>(family, Stage::Write, request)
                        .await?;
                    tracing::info!(
                        "DNS record created: {} {} -> {}",
                        record_type,
                        self.domain,
                        address
                    );
                }

                Ok(RecordChange::Created)
            }
        }
    }

    fn updater_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare updaters
pub struct CloudflareFactory;

impl RecordUpdaterFactory for CloudflareFactory {
    fn create(&self, config: &UpdaterConfig) -> Result<Box<dyn RecordUpdater>> {
        match config {
            UpdaterConfig::Cloudflare {
                domain,
                api_token,
                email,
                api_key,
                zone_id,
                ttl,
                dry_run,
            } => {
                let credentials = match (api_token, email, api_key) {
                    (Some(token), _, _) if !token.is_empty() => Credentials::Token(token.clone()),
                    (_, Some(email), Some(api_key)) => Credentials::GlobalKey {
                        email: email.clone(),
                        api_key: api_key.clone(),
                    },
                    _ => {
                        return Err(Error::config(
                            "Cloudflare requires api_token or email + api_key",
                        ));
                    }
                };

                if *dry_run {
                    tracing::warn!("Cloudflare updater running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(CloudflareUpdater::new(
                    domain.clone(),
                    credentials,
                    zone_id.clone(),
                    *ttl,
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare updater")),
        }
    }
}

/// Register the Cloudflare updater with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_updater("cloudflare", Box::new(CloudflareFactory));
}
