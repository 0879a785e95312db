//! Configuration types for uddns
//!
//! Every backend category is a tagged enum: the `type` field names exactly
//! one registered factory. There is no "try each constructor until one
//! works" selection.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Poll interval used when none is configured or the configured one is unusable
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Main uddns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UddnsConfig {
    /// Poll interval in humantime syntax ("30s", "5m")
    #[serde(default)]
    pub interval: Option<String>,

    /// Address provider configuration
    pub provider: ProviderConfig,

    /// Record updater configuration
    pub updater: UpdaterConfig,

    /// Optional notifier configuration
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
}

impl UddnsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.updater.validate()?;
        if let Some(notifier) = &self.notifier {
            notifier.validate()?;
        }
        Ok(())
    }

    /// Loop settings derived from this configuration
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            interval: parse_interval(self.interval.as_deref()),
            ..LoopConfig::default()
        }
    }
}

/// Parse a poll interval, falling back to [`DEFAULT_INTERVAL`]
///
/// Unset or blank values fall back silently. Values that do not parse, or
/// parse to zero, fall back with a warning.
pub fn parse_interval(raw: Option<&str>) -> Duration {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return DEFAULT_INTERVAL,
    };

    match humantime::parse_duration(raw) {
        Ok(duration) if !duration.is_zero() => duration,
        Ok(_) => {
            warn!(
                "Poll interval must be greater than zero, using default {:?}",
                DEFAULT_INTERVAL
            );
            DEFAULT_INTERVAL
        }
        Err(e) => {
            warn!(
                "Failed to parse poll interval {:?} ({}), using default {:?}",
                raw, e, DEFAULT_INTERVAL
            );
            DEFAULT_INTERVAL
        }
    }
}

/// Reconciliation loop settings
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Sleep between the end of one cycle and the start of the next
    pub interval: Duration,

    /// Capacity of the loop event channel
    ///
    /// When full, events are dropped with a warning.
    pub event_channel_capacity: usize,
}

impl LoopConfig {
    /// Settings with the given interval and default channel capacity
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    256
}

/// Address provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Public IP-echo services, tried in order
    IpService {
        /// Service names ("ip.fm", "ifconfig.me", ...) or literal URLs
        services: Vec<String>,
    },

    /// Addresses bound to a local network interface
    Netif {
        /// Interface name (e.g., "eth0", "ppp0")
        name: String,
    },

    /// MikroTik RouterOS REST API
    #[serde(rename = "routeros")]
    RouterOs {
        /// Router base URL (e.g., "https://192.168.88.1")
        endpoint: String,
        /// API user
        username: String,
        /// API password
        #[serde(default)]
        password: String,
        /// Skip TLS verification (defaults to true, routers ship self-signed certs)
        #[serde(default)]
        insecure: Option<bool>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::IpService { services } => {
                if services.is_empty() {
                    return Err(crate::Error::config("ip_service: no services configured"));
                }
                if services.iter().any(|s| s.trim().is_empty()) {
                    return Err(crate::Error::config("ip_service: empty service name"));
                }
                Ok(())
            }
            ProviderConfig::Netif { name } => {
                if name.trim().is_empty() {
                    return Err(crate::Error::config("netif: interface name cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::RouterOs {
                endpoint, username, ..
            } => {
                if endpoint.is_empty() || username.is_empty() {
                    return Err(crate::Error::config(
                        "routeros: endpoint and username are required",
                    ));
                }
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "routeros: endpoint must be an http(s) URL, got {}",
                        endpoint
                    )));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => validate_custom("provider", factory, config),
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::IpService { .. } => "ip_service",
            ProviderConfig::Netif { .. } => "netif",
            ProviderConfig::RouterOs { .. } => "routeros",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Record updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdaterConfig {
    /// Cloudflare API v4
    Cloudflare {
        /// Fully qualified record name (e.g., "home.example.com")
        domain: String,
        /// Scoped API token (preferred)
        #[serde(default)]
        api_token: Option<String>,
        /// Account email for legacy global API key auth
        #[serde(default)]
        email: Option<String>,
        /// Legacy global API key
        #[serde(default)]
        api_key: Option<String>,
        /// Zone ID (optional, looked up from the domain when absent)
        #[serde(default)]
        zone_id: Option<String>,
        /// TTL for newly created records
        #[serde(default)]
        ttl: Option<u32>,
        /// Perform lookups but skip writes
        #[serde(default)]
        dry_run: bool,
    },

    /// DuckDNS
    #[serde(rename = "duckdns")]
    DuckDns {
        /// Subdomain(s) under duckdns.org, comma separated
        domain: String,
        /// Account token
        token: String,
    },

    /// ddns.fm
    #[serde(rename = "ddnsfm")]
    DdnsFm {
        /// Record name
        domain: String,
        /// Update key
        key: String,
    },

    /// LightDNS
    #[serde(rename = "lightdns")]
    LightDns {
        /// Record name
        domain: String,
        /// Update key
        key: String,
    },

    /// Alibaba Cloud DNS (AliDNS)
    Aliyun {
        /// Fully qualified record name (e.g., "home.example.com")
        domain: String,
        /// RAM access key id
        access_key_id: String,
        /// RAM access key secret
        access_key_secret: String,
        /// API region, `cn-hangzhou` when unset
        #[serde(default)]
        region_id: Option<String>,
    },

    /// Custom updater
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl UpdaterConfig {
    /// Validate the updater configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            UpdaterConfig::Cloudflare {
                domain,
                api_token,
                email,
                api_key,
                ..
            } => {
                if domain.is_empty() {
                    return Err(crate::Error::config("cloudflare: domain cannot be empty"));
                }
                let has_token = api_token.as_deref().is_some_and(|t| !t.is_empty());
                let has_key = email.as_deref().is_some_and(|e| !e.is_empty())
                    && api_key.as_deref().is_some_and(|k| !k.is_empty());
                if !has_token && !has_key {
                    return Err(crate::Error::config(
                        "cloudflare: either api_token or email + api_key is required",
                    ));
                }
                Ok(())
            }
            UpdaterConfig::DuckDns { domain, token } => {
                require_pair("duckdns", ("domain", domain), ("token", token))
            }
            UpdaterConfig::DdnsFm { domain, key } => {
                require_pair("ddnsfm", ("domain", domain), ("key", key))
            }
            UpdaterConfig::LightDns { domain, key } => {
                require_pair("lightdns", ("domain", domain), ("key", key))
            }
            UpdaterConfig::Aliyun {
                domain,
                access_key_id,
                access_key_secret,
                ..
            } => {
                if domain.is_empty() {
                    return Err(crate::Error::config("aliyun: domain cannot be empty"));
                }
                require_pair(
                    "aliyun",
                    ("access_key_id", access_key_id),
                    ("access_key_secret", access_key_secret),
                )
            }
            UpdaterConfig::Custom { factory, config } => validate_custom("updater", factory, config),
        }
    }

    /// Get the updater type name
    pub fn type_name(&self) -> &str {
        match self {
            UpdaterConfig::Cloudflare { .. } => "cloudflare",
            UpdaterConfig::DuckDns { .. } => "duckdns",
            UpdaterConfig::DdnsFm { .. } => "ddnsfm",
            UpdaterConfig::LightDns { .. } => "lightdns",
            UpdaterConfig::Aliyun { .. } => "aliyun",
            UpdaterConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Telegram Bot API
    Telegram {
        /// Bot token
        token: String,
        /// Target chat
        chat_id: String,
        /// Optional proxy URL
        #[serde(default)]
        proxy: Option<String>,
    },

    /// Custom notifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Telegram { token, chat_id, .. } => {
                require_pair("telegram", ("token", token), ("chat_id", chat_id))
            }
            NotifierConfig::Custom { factory, config } => validate_custom("notifier", factory, config),
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Telegram { .. } => "telegram",
            NotifierConfig::Custom { factory, .. } => factory,
        }
    }
}

fn require_pair(
    kind: &str,
    (a_name, a): (&str, &str),
    (b_name, b): (&str, &str),
) -> Result<(), crate::Error> {
    if a.is_empty() || b.is_empty() {
        return Err(crate::Error::config(format!(
            "{}: {} and {} are required",
            kind, a_name, b_name
        )));
    }
    Ok(())
}

fn validate_custom(
    category: &str,
    factory: &str,
    config: &serde_json::Value,
) -> Result<(), crate::Error> {
    if factory.is_empty() {
        return Err(crate::Error::config(format!(
            "Custom {} factory cannot be empty",
            category
        )));
    }
    if config.is_null() {
        return Err(crate::Error::config(format!(
            "Custom {} config cannot be null",
            category
        )));
    }
    Ok(())
}
